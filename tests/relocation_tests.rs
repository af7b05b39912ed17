//! Integration tests for project relocation against the in-memory host

mod common;

use camino::{Utf8Path, Utf8PathBuf};
use common::{MemoryHost, Mutation, SceneData, utf8_dir, write_file};
use shotkit::host::{HostError, SceneHost};
use shotkit::models::{CopyFailurePolicy, PipelineSettings, RunPhase, RunWarning};
use shotkit::services::{MirrorError, RelocationOptions, ValidationError};
use shotkit::{Metrics, PathCatalog, ProjectMirror, ProjectRoot, RunStateManager};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    source: Utf8PathBuf,
    dest: Utf8PathBuf,
    library: Utf8PathBuf,
}

impl Fixture {
    /// A source project `forest` with a workspace, a texture, a referenced
    /// rock scene and a main scene.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = utf8_dir(&dir);
        let source = root.join("work/forest");
        let dest = root.join("farm/jdoe/forest");
        let library = root.join("library");

        write_file(&source.join("workspace.mel"), "workspace -fr \"images\" \"images\";");
        write_file(&source.join("sourceimages/bark.tx"), "bark");
        write_file(&source.join("scenes/rock.ma"), "rock");
        write_file(&source.join("scenes/main.ma"), "main");
        write_file(&library.join("leaf.tx"), "leaf");

        Self {
            _dir: dir,
            source,
            dest,
            library,
        }
    }

    fn main_scene(&self) -> Utf8PathBuf {
        self.source.join("scenes/main.ma")
    }

    fn rock_scene(&self) -> Utf8PathBuf {
        self.source.join("scenes/rock.ma")
    }

    fn bark(&self) -> Utf8PathBuf {
        self.source.join("sourceimages/bark.tx")
    }

    fn host(&self) -> MemoryHost {
        let main = SceneData::default()
            .with_usage(&self.bark())
            .with_record("barkFile.fileTextureName", &self.bark())
            .with_record("leafFile.fileTextureName", &self.library.join("leaf.tx"))
            .with_reference("rockRN", &self.rock_scene(), true);
        let rock = SceneData::default().with_record("rockFile.fileTextureName", &self.bark());

        MemoryHost::new(&self.main_scene(), &self.source)
            .with_scene(&self.main_scene(), main)
            .with_scene(&self.rock_scene(), rock)
    }

    fn options(&self) -> RelocationOptions {
        RelocationOptions::new(
            ProjectRoot::new(&self.source),
            ProjectRoot::new(&self.dest),
            &PipelineSettings::default(),
        )
    }
}

fn mirror() -> (ProjectMirror, RunStateManager, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let state = RunStateManager::new();
    (ProjectMirror::new(metrics.clone(), state.clone()), state, metrics)
}

fn dest_of(fixture: &Fixture, path: &Utf8Path) -> Utf8PathBuf {
    fixture.dest.join(path.strip_prefix(&fixture.source).unwrap())
}

#[test]
fn test_relocation_copies_and_rewrites_everything() {
    let fixture = Fixture::new();
    let mut host = fixture.host();
    let (mirror, state, _) = mirror();

    let ctx = host.current();
    let report = mirror.relocate(&mut host, ctx, &fixture.options()).unwrap();

    assert!(report.is_done(), "{}", report.summary());
    let main_copy = dest_of(&fixture, &fixture.main_scene());
    let rock_copy = dest_of(&fixture, &fixture.rock_scene());
    let bark_copy = dest_of(&fixture, &fixture.bark());
    assert_eq!(report.scene_file.as_ref(), Some(&main_copy));

    assert!(fixture.dest.join("workspace.mel").is_file());
    assert!(bark_copy.is_file());
    assert!(rock_copy.is_file());
    assert!(main_copy.is_file());
    assert!(fixture.dest.join("images").is_dir());

    // Records under the source root move, others stay
    assert_eq!(host.record(&main_copy, "barkFile.fileTextureName"), Some(&bark_copy));
    assert_eq!(
        host.record(&main_copy, "leafFile.fileTextureName"),
        Some(&fixture.library.join("leaf.tx"))
    );
    assert_eq!(host.record(&rock_copy, "rockFile.fileTextureName"), Some(&bark_copy));

    // The source documents are never edited
    assert_eq!(host.record(&fixture.main_scene(), "barkFile.fileTextureName"), Some(&fixture.bark()));

    assert_eq!(host.active.project_root, fixture.dest);
    assert_eq!(state.phase(), RunPhase::Done);
}

#[test]
fn test_relocation_step_order() {
    let fixture = Fixture::new();
    let mut host = fixture.host();
    let (mirror, _, _) = mirror();

    let ctx = host.current();
    mirror.relocate(&mut host, ctx, &fixture.options()).unwrap();

    let main_copy = dest_of(&fixture, &fixture.main_scene());
    let rock_copy = dest_of(&fixture, &fixture.rock_scene());

    let workspace = host.position(|m| matches!(m, Mutation::WorkspaceSourced(_))).unwrap();
    let project = host.position(|m| matches!(m, Mutation::ProjectSet(_))).unwrap();
    let open_rock = host.position(|m| *m == Mutation::Opened(rock_copy.clone())).unwrap();
    let save_rock = host.position(|m| *m == Mutation::Saved(rock_copy.clone())).unwrap();
    let open_main = host.position(|m| *m == Mutation::Opened(main_copy.clone())).unwrap();
    let unload = host.position(|m| *m == Mutation::Unloaded("rockRN".to_string())).unwrap();
    let rewrite_main = host
        .position(|m| matches!(m, Mutation::RecordSet { scene, .. } if *scene == main_copy))
        .unwrap();
    let reload = host.position(|m| *m == Mutation::Loaded("rockRN".to_string())).unwrap();
    let save_main = host.position(|m| *m == Mutation::Saved(main_copy.clone())).unwrap();

    assert!(workspace < project);
    assert!(project < open_rock);
    assert!(open_rock < save_rock);
    assert!(save_rock < open_main);
    assert!(open_main < unload);
    assert!(unload < rewrite_main);
    assert!(rewrite_main < reload);
    assert!(reload < save_main);
    assert_eq!(save_main, host.mutations.len() - 1);
}

#[test]
fn test_second_relocation_skips_up_to_date_copies() {
    let fixture = Fixture::new();
    let mut host = fixture.host();
    let (mirror, _, metrics) = mirror();

    let ctx = host.current();
    mirror.relocate(&mut host, ctx, &fixture.options()).unwrap();
    assert_eq!(metrics.files_copied.load(Ordering::Relaxed), 4);

    let bark_copy = dest_of(&fixture, &fixture.bark());
    let first_mtime = fs::metadata(&bark_copy).unwrap().modified().unwrap();

    // Back to the source scene for a second run
    let mut host = fixture.host();
    let ctx = host.current();
    let report = mirror.relocate(&mut host, ctx, &fixture.options()).unwrap();

    assert!(report.is_done());
    assert_eq!(metrics.files_copied.load(Ordering::Relaxed), 4);
    assert_eq!(metrics.files_skipped.load(Ordering::Relaxed), 4);
    assert_eq!(fs::metadata(&bark_copy).unwrap().modified().unwrap(), first_mtime);
    assert_eq!(fs::read_to_string(&bark_copy).unwrap(), "bark");
}

#[test]
fn test_scene_already_in_destination_is_not_copied() {
    let fixture = Fixture::new();
    let main_copy = dest_of(&fixture, &fixture.main_scene());
    write_file(&main_copy, "main");

    let mut host = MemoryHost::new(&main_copy, &fixture.source)
        .with_scene(&main_copy, SceneData::default().with_usage(&fixture.bark()));
    let (mirror, state, metrics) = mirror();

    let ctx = host.current();
    let report = mirror.relocate(&mut host, ctx, &fixture.options()).unwrap();

    assert!(report.is_done());
    assert_eq!(report.scene_file.as_ref(), Some(&main_copy));
    assert_eq!(host.mutations, vec![Mutation::ProjectSet(fixture.dest.clone())]);
    assert_eq!(metrics.files_copied.load(Ordering::Relaxed), 0);
    assert!(!fixture.dest.join("sourceimages").exists());
    assert!(fixture.dest.join("images").is_dir());
    assert_eq!(state.phase(), RunPhase::Done);
}

#[test]
fn test_scene_in_destination_is_still_validated() {
    let fixture = Fixture::new();
    let main_copy = dest_of(&fixture, &fixture.main_scene());
    write_file(&main_copy, "main");
    let missing = fixture.source.join("sourceimages/moss.tx");

    let mut host = MemoryHost::new(&main_copy, &fixture.source).with_scene(
        &main_copy,
        SceneData::default().with_usage(&fixture.bark()).with_usage(&missing),
    );
    let (mirror, state, _) = mirror();

    let ctx = host.current();
    let err = mirror.relocate(&mut host, ctx, &fixture.options()).unwrap_err();

    match err {
        MirrorError::Validation(ValidationError::BrokenDependencies { nonexistent, .. }) => {
            assert_eq!(nonexistent, vec![missing]);
        }
        other => panic!("Expected broken dependencies, got {:?}", other),
    }
    assert!(host.mutations.is_empty(), "{:?}", host.mutations);
    assert!(!fixture.dest.join("images").exists());
    assert_eq!(state.phase(), RunPhase::Aborted);
}

#[test]
fn test_references_reloaded_when_rewrite_fails() {
    let fixture = Fixture::new();
    let mut host = fixture.host();
    let main_copy = dest_of(&fixture, &fixture.main_scene());
    host.unlistable_scenes.insert(main_copy.clone());
    let (mirror, state, _) = mirror();

    let ctx = host.current();
    let err = mirror.relocate(&mut host, ctx, &fixture.options()).unwrap_err();

    assert!(matches!(err, MirrorError::Host(HostError::CommandFailed { .. })), "{:?}", err);
    let unload = host.position(|m| *m == Mutation::Unloaded("rockRN".to_string())).unwrap();
    let reload = host.position(|m| *m == Mutation::Loaded("rockRN".to_string())).unwrap();
    assert!(unload < reload);

    let references = &host.scene(&main_copy).unwrap().references;
    assert!(references.iter().all(|r| r.loaded), "{:?}", references);
    assert!(!host.mutations.contains(&Mutation::Saved(main_copy)));
    assert_eq!(state.phase(), RunPhase::Aborted);
}

#[test]
fn test_workspace_images_rule_names_output_directory() {
    let fixture = Fixture::new();
    let mut host = fixture.host();
    host.output_rules.insert("images".to_string(), "renders".to_string());
    let (mirror, _, _) = mirror();

    let ctx = host.current();
    mirror.relocate(&mut host, ctx, &fixture.options()).unwrap();

    assert!(fixture.dest.join("renders").is_dir());
    assert!(!fixture.dest.join("images").exists());
}

#[test]
fn test_broken_dependencies_abort_before_any_write() {
    let fixture = Fixture::new();
    let missing = fixture.source.join("sourceimages/moss.tx");
    let outside = fixture.library.join("leaf.tx");

    let main = SceneData::default()
        .with_usage(&fixture.bark())
        .with_usage(&missing)
        .with_usage(&outside)
        .with_record("barkFile.fileTextureName", &fixture.bark());
    let mut host = MemoryHost::new(&fixture.main_scene(), &fixture.source)
        .with_scene(&fixture.main_scene(), main);
    let (mirror, state, metrics) = mirror();

    let ctx = host.current();
    let err = mirror.relocate(&mut host, ctx, &fixture.options()).unwrap_err();

    match &err {
        MirrorError::Validation(ValidationError::BrokenDependencies {
            invalid,
            nonexistent,
            references,
        }) => {
            assert_eq!(invalid, &vec![outside.clone()]);
            assert_eq!(nonexistent, &vec![missing.clone()]);
            assert!(references.is_empty());
        }
        other => panic!("Expected broken dependencies, got {:?}", other),
    }
    let message = err.to_string();
    assert!(message.contains("leaf.tx"));
    assert!(message.contains("moss.tx"));

    assert!(host.mutations.is_empty());
    assert!(!fixture.dest.exists());
    assert_eq!(metrics.files_copied.load(Ordering::Relaxed), 0);
    assert_eq!(state.phase(), RunPhase::Aborted);
}

#[test]
fn test_reference_outside_project_aborts() {
    let fixture = Fixture::new();
    let outside_ref = fixture.library.join("tree.ma");
    write_file(&outside_ref, "tree");

    let main = SceneData::default().with_reference("treeRN", &outside_ref, true);
    let mut host = MemoryHost::new(&fixture.main_scene(), &fixture.source)
        .with_scene(&fixture.main_scene(), main);
    let (mirror, _, _) = mirror();

    let ctx = host.current();
    let err = mirror.relocate(&mut host, ctx, &fixture.options()).unwrap_err();

    assert!(matches!(
        err,
        MirrorError::Validation(ValidationError::BrokenDependencies { ref references, .. })
            if references == &vec![outside_ref.clone()]
    ));
    assert!(host.mutations.is_empty());
}

#[test]
fn test_protected_record_is_reported_not_fatal() {
    let fixture = Fixture::new();
    let mut host = fixture.host();
    host.protected_records.insert("barkFile.fileTextureName".to_string());
    let (mirror, _, metrics) = mirror();

    let ctx = host.current();
    let report = mirror.relocate(&mut host, ctx, &fixture.options()).unwrap();

    assert!(report.is_done());
    assert_eq!(
        report.count_warnings(|w| matches!(
            w,
            RunWarning::UnresolvedRecord { record, .. } if record == "barkFile.fileTextureName"
        )),
        1
    );
    assert_eq!(metrics.records_unresolved.load(Ordering::Relaxed), 1);
    // The rest of the scene is still rewritten and saved
    let main_copy = dest_of(&fixture, &fixture.main_scene());
    assert!(host.mutations.contains(&Mutation::Saved(main_copy)));
}

#[test]
fn test_lenient_policy_records_copy_failure() {
    let fixture = Fixture::new();
    let mut host = fixture.host();
    let (mirror, _, metrics) = mirror();

    // A file where the texture's destination directory belongs makes its copy fail
    write_file(&fixture.dest.join("sourceimages"), "not a directory");

    let mut options = fixture.options();
    options.policy = CopyFailurePolicy::Lenient;

    let ctx = host.current();
    let report = mirror.relocate(&mut host, ctx, &options).unwrap();

    assert!(report.is_done());
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("bark.tx"));
    assert_eq!(metrics.copy_failures.load(Ordering::Relaxed), 1);
}

#[test]
fn test_strict_policy_stops_on_copy_failure() {
    let fixture = Fixture::new();
    let mut host = fixture.host();
    let (mirror, state, _) = mirror();

    write_file(&fixture.dest.join("sourceimages"), "not a directory");

    let ctx = host.current();
    let err = mirror.relocate(&mut host, ctx, &fixture.options()).unwrap_err();

    assert!(matches!(err, MirrorError::Copy { .. }));
    assert_eq!(state.phase(), RunPhase::Aborted);
}

#[test]
fn test_stale_context_is_rejected() {
    let fixture = Fixture::new();
    let host = fixture.host();
    let stale = shotkit::SceneContext::new(fixture.rock_scene(), fixture.source.clone());

    let err = PathCatalog::classify(&host, &stale, &ProjectRoot::new(&fixture.source)).unwrap_err();
    assert!(matches!(err, HostError::StaleContext { .. }));
}
