//! End-to-end sync scenarios through SyncEngine

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use hub_core::{
    ActionKind, ConflictPolicy, Direction, Error, HubConfig, MANIFEST_FILE, ProjectId, SyncEngine, SyncOptions,
};
use hub_fs::digest;
use hub_test_utils::TestHub;
use pretty_assertions::assert_eq;

struct Fixture {
    hub: TestHub,
    engine: SyncEngine,
    project: PathBuf,
}

fn fixture() -> Fixture {
    let mut hub = TestHub::new();
    hub.with_set("shell", &[(".bashrc", "export EDITOR=vim\n"), (".vimrc", "set number\n")]);
    hub.with_set("python", &[("pyproject.toml", "[tool.ruff]\n"), (".python-version", "3.12\n")]);
    let engine = SyncEngine::open(&HubConfig::for_catalog(hub.catalog_path())).unwrap();
    let project = hub.project("api");
    Fixture { hub, engine, project }
}

fn shell() -> Vec<String> {
    vec!["shell".to_string()]
}

fn pull_only() -> SyncOptions {
    SyncOptions::new(Direction::PullOnly)
}

mod scenarios {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_pull_adopts_every_file_and_records_template_digests() {
        let f = fixture();

        let report = f.engine.sync(&f.project, &shell(), &pull_only()).unwrap();

        let result = &report.results[0];
        let applied: Vec<&str> = result.applied.iter().map(|a| a.relative_path.as_str()).collect();
        assert_eq!(applied, vec![".bashrc", ".vimrc"]);
        assert!(result.applied.iter().all(|a| a.kind == ActionKind::Adopt));
        assert!(report.is_success());
        assert_eq!(report.registry_version, Some(1));

        f.hub.assert_content(&f.project, ".bashrc", "export EDITOR=vim\n");
        f.hub.assert_content(&f.project, ".vimrc", "set number\n");

        let registry = f.engine.registry().unwrap();
        let project = ProjectId::resolve(&f.project).unwrap();
        let snapshot = registry.get_snapshot(&project, "shell").unwrap();
        assert_eq!(snapshot.digest(".bashrc"), Some(&digest(b"export EDITOR=vim\n")));
        assert_eq!(snapshot.digest(".vimrc"), Some(&digest(b"set number\n")));
    }

    #[test]
    fn diverged_file_is_reported_and_nothing_is_modified() {
        let f = fixture();
        f.engine.sync(&f.project, &shell(), &pull_only()).unwrap();

        f.hub.write_template("shell", ".vimrc", "set number\nset ruler\n");
        f.hub.write(&f.project, ".vimrc", "set relativenumber\n");
        let template_before = fs::read(f.hub.template_path("shell", ".vimrc")).unwrap();
        let project_before = fs::read(f.project.join(".vimrc")).unwrap();

        let report = f.engine.sync(&f.project, &shell(), &SyncOptions::default()).unwrap();

        let result = &report.results[0];
        assert!(result.applied.is_empty());
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].relative_path, ".bashrc");
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].relative_path, ".vimrc");
        assert!(report.has_conflicts());
        assert!(!report.is_success());

        assert_eq!(fs::read(f.hub.template_path("shell", ".vimrc")).unwrap(), template_before);
        assert_eq!(fs::read(f.project.join(".vimrc")).unwrap(), project_before);
    }
}

mod properties {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn second_sync_applies_nothing() {
        let f = fixture();
        f.engine.sync(&f.project, &shell(), &SyncOptions::default()).unwrap();

        let again = f.engine.sync(&f.project, &shell(), &SyncOptions::default()).unwrap();

        let result = &again.results[0];
        assert!(result.applied.is_empty());
        assert_eq!(result.skipped.len(), 2);
        assert!(again.is_success());
    }

    #[test]
    fn conflict_without_policy_keeps_reporting_until_resolved() {
        let f = fixture();
        f.hub.write(&f.project, ".bashrc", "alias ll='ls -l'\n");

        for _ in 0..2 {
            let report = f.engine.sync(&f.project, &shell(), &SyncOptions::default()).unwrap();
            assert_eq!(report.results[0].conflicts.len(), 1);
            f.hub.assert_content(&f.project, ".bashrc", "alias ll='ls -l'\n");
            f.hub.assert_content(f.hub.templates_dir().join("shell").as_path(), ".bashrc", "export EDITOR=vim\n");
        }

        let resolved = f
            .engine
            .sync(
                &f.project,
                &shell(),
                &SyncOptions::default().with_policy(ConflictPolicy::AlwaysPreferProject),
            )
            .unwrap();
        assert_eq!(resolved.results[0].applied[0].kind, ActionKind::Push);
        f.hub
            .assert_content(f.hub.templates_dir().join("shell").as_path(), ".bashrc", "alias ll='ls -l'\n");

        let after = f.engine.sync(&f.project, &shell(), &SyncOptions::default()).unwrap();
        assert!(after.is_success());
    }

    #[test]
    fn pull_then_push_round_trip() {
        let f = fixture();
        f.engine.sync(&f.project, &shell(), &pull_only()).unwrap();

        f.hub.write_template("shell", ".bashrc", "export EDITOR=nvim\n");
        let pulled = f.engine.sync(&f.project, &shell(), &SyncOptions::default()).unwrap();
        assert_eq!(pulled.results[0].applied[0].kind, ActionKind::Pull);
        f.hub.assert_content(&f.project, ".bashrc", "export EDITOR=nvim\n");

        f.hub.write(&f.project, ".vimrc", "set number\nsyntax on\n");
        let pushed = f
            .engine
            .sync(&f.project, &shell(), &SyncOptions::new(Direction::PushOnly))
            .unwrap();
        assert_eq!(pushed.results[0].applied[0].kind, ActionKind::Push);
        assert_eq!(
            fs::read_to_string(f.hub.template_path("shell", ".vimrc")).unwrap(),
            "set number\nsyntax on\n"
        );
    }

    #[test]
    fn nested_destinations_get_parent_directories() {
        let mut hub = TestHub::new();
        hub.with_set("git", &[(".config/git/ignore", "*.swp\n")]);
        let engine = SyncEngine::open(&HubConfig::for_catalog(hub.catalog_path())).unwrap();
        let project = hub.project("api");

        engine.sync(&project, &["git".to_string()], &pull_only()).unwrap();
        hub.assert_content(&project, ".config/git/ignore", "*.swp\n");
    }
}

mod failures {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_set_aborts_before_any_write() {
        let f = fixture();
        let err = f
            .engine
            .sync(&f.project, &["shell".to_string(), "zsh".to_string()], &pull_only())
            .unwrap_err();

        assert!(matches!(err, Error::SetNotFound { ref name } if name == "zsh"));
        f.hub.assert_missing(&f.project, ".bashrc");
        assert!(f.hub.registry_bytes().is_none());
    }

    #[test]
    fn unregistered_project_without_sets_is_not_found() {
        let f = fixture();
        let err = f.engine.sync(&f.project, &[], &pull_only()).unwrap_err();
        assert!(matches!(err, Error::ProjectNotFound { .. }));
    }

    #[test]
    fn failed_file_is_reported_and_set_is_not_registered() {
        let mut hub = TestHub::new();
        hub.with_set("dev", &[(".bashrc", "export A=1\n"), (".config/git/ignore", "*.swp\n")]);
        let engine = SyncEngine::open(&HubConfig::for_catalog(hub.catalog_path())).unwrap();
        let project = hub.project("api");
        // A regular file where a directory is needed makes the write fail
        hub.write(&project, ".config", "not a directory\n");

        let report = engine.sync(&project, &["dev".to_string()], &pull_only()).unwrap();
        let result = &report.results[0];

        assert_eq!(result.applied.len(), 1);
        assert_eq!(result.applied[0].relative_path, ".bashrc");
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].relative_path, ".config/git/ignore");
        assert!(report.has_failures());
        assert_eq!(report.registry_version, None);

        let key = ProjectId::resolve(&project).unwrap();
        assert!(engine.registry().unwrap().project(&key).is_none());
        hub.assert_content(&project, ".config", "not a directory\n");
    }

    #[test]
    fn unreadable_file_is_a_failure_and_other_files_still_sync() {
        let mut hub = TestHub::new();
        hub.with_set("dev", &[(".bashrc", "export A=1\n"), (".config", "[core]\n")]);
        let engine = SyncEngine::open(&HubConfig::for_catalog(hub.catalog_path())).unwrap();
        let project = hub.project("api");
        fs::create_dir_all(project.join(".config")).unwrap();

        let report = engine.sync(&project, &["dev".to_string()], &pull_only()).unwrap();
        let result = &report.results[0];

        assert_eq!(result.applied_paths(), vec![".bashrc".to_string()]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].relative_path, ".config");
        assert_eq!(result.failures[0].kind, ActionKind::Unreadable);
        assert_eq!(report.registry_version, None);
        hub.assert_content(&project, ".bashrc", "export A=1\n");
        assert!(project.join(".config").is_dir());
    }

    #[test]
    fn filter_naming_an_unmanaged_file_aborts_before_any_write() {
        let f = fixture();
        let err = f
            .engine
            .sync(&f.project, &shell(), &pull_only().with_files([".zshrc"]))
            .unwrap_err();

        assert!(matches!(err, Error::FileNotManaged { ref path } if path == ".zshrc"));
        f.hub.assert_missing(&f.project, ".bashrc");
        assert!(f.hub.registry_bytes().is_none());
    }

    #[test]
    fn cancelled_run_does_not_record_a_snapshot() {
        let f = fixture();
        let cancel = Arc::new(AtomicBool::new(true));

        let report = f
            .engine
            .sync(&f.project, &shell(), &pull_only().with_cancel(cancel))
            .unwrap();

        assert!(report.is_cancelled());
        assert!(!report.is_success());
        assert!(f.hub.registry_bytes().is_none());

        // The next run recomputes from the filesystem and finishes
        let report = f.engine.sync(&f.project, &shell(), &pull_only()).unwrap();
        assert_eq!(report.applied_count(), 2);
        assert!(report.is_success());
    }
}

mod shared_paths {
    use super::*;
    use pretty_assertions::assert_eq;

    fn overlapping() -> (TestHub, SyncEngine, PathBuf) {
        let mut hub = TestHub::new();
        hub.with_set("a", &[(".gitignore", "A\n")]);
        hub.with_set("b", &[(".gitignore", "B\n")]);
        let engine = SyncEngine::open(&HubConfig::for_catalog(hub.catalog_path())).unwrap();
        let project = hub.project("api");
        (hub, engine, project)
    }

    fn both() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn later_set_does_not_overwrite_a_path_an_earlier_set_wrote() {
        let (hub, engine, project) = overlapping();

        let report = engine.sync(&project, &both(), &pull_only()).unwrap();

        assert_eq!(report.results[0].applied_paths(), vec![".gitignore".to_string()]);
        assert!(report.results[1].applied.is_empty());
        assert_eq!(report.results[1].conflicts.len(), 1);
        assert!(report.has_conflicts());
        hub.assert_content(&project, ".gitignore", "A\n");
    }

    #[test]
    fn next_bidirectional_sync_never_pushes_into_the_other_template() {
        let (hub, engine, project) = overlapping();
        engine.sync(&project, &both(), &pull_only()).unwrap();

        let report = engine.sync(&project, &both(), &SyncOptions::default()).unwrap();

        assert_eq!(report.applied_count(), 0);
        assert_eq!(report.results[1].conflicts.len(), 1);
        assert_eq!(fs::read_to_string(hub.template_path("a", ".gitignore")).unwrap(), "A\n");
        assert_eq!(fs::read_to_string(hub.template_path("b", ".gitignore")).unwrap(), "B\n");
        hub.assert_content(&project, ".gitignore", "A\n");
    }

    #[test]
    fn policy_does_not_let_a_later_set_take_over_a_claimed_path() {
        let (hub, engine, project) = overlapping();
        let options = pull_only().with_policy(ConflictPolicy::AlwaysPreferTemplate);

        let report = engine.sync(&project, &both(), &options).unwrap();

        let conflict = &report.results[1].conflicts[0];
        assert!(conflict.note.as_deref().unwrap().contains("set 'a'"));
        hub.assert_content(&project, ".gitignore", "A\n");
    }

    #[test]
    fn status_marks_the_shared_path_as_conflict() {
        let (_hub, engine, project) = overlapping();

        let plans = engine.status(&project, &both(), &pull_only()).unwrap();

        assert_eq!(plans[0].actions[0].kind, ActionKind::Adopt);
        assert_eq!(plans[1].actions[0].kind, ActionKind::Conflict);
    }
}

mod file_filter {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn only_selected_files_are_synced() {
        let f = fixture();

        let report = f
            .engine
            .sync(&f.project, &shell(), &pull_only().with_files([".vimrc"]))
            .unwrap();

        assert_eq!(report.results[0].applied_paths(), vec![".vimrc".to_string()]);
        f.hub.assert_content(&f.project, ".vimrc", "set number\n");
        f.hub.assert_missing(&f.project, ".bashrc");
    }

    #[test]
    fn unselected_files_keep_their_snapshot_entry() {
        let f = fixture();
        f.engine.sync(&f.project, &shell(), &pull_only()).unwrap();
        f.hub.write_template("shell", ".bashrc", "export EDITOR=hx\n");
        f.hub.write_template("shell", ".vimrc", "set nonumber\n");

        f.engine
            .sync(&f.project, &shell(), &pull_only().with_files([".vimrc"]))
            .unwrap();

        let key = ProjectId::resolve(&f.project).unwrap();
        let registry = f.engine.registry().unwrap();
        let snapshot = registry.get_snapshot(&key, "shell").unwrap();
        assert_eq!(snapshot.digest(".bashrc"), Some(&digest(b"export EDITOR=vim\n")));
        assert_eq!(snapshot.digest(".vimrc"), Some(&digest(b"set nonumber\n")));
        f.hub.assert_content(&f.project, ".bashrc", "export EDITOR=vim\n");

        // The held-back file is still a plain pull afterwards
        let report = f.engine.sync(&f.project, &shell(), &SyncOptions::default()).unwrap();
        assert_eq!(report.results[0].applied[0].kind, ActionKind::Pull);
        assert!(report.is_success());
    }

    #[test]
    fn sets_without_a_selected_file_are_left_out() {
        let f = fixture();
        let sets = vec!["shell".to_string(), "python".to_string()];

        let report = f
            .engine
            .sync(&f.project, &sets, &pull_only().with_files([".bashrc"]))
            .unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].set_name, "shell");
        let key = ProjectId::resolve(&f.project).unwrap();
        let registry = f.engine.registry().unwrap();
        assert!(registry.get_snapshot(&key, "python").is_none());
    }
}

mod operations {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn active_sets_combine_registry_and_manifest() {
        let f = fixture();
        f.engine.register(&f.project, "shell").unwrap();
        f.hub.write(&f.project, MANIFEST_FILE, "environment_sets: [shell, python]\n");

        assert_eq!(f.engine.active_sets(&f.project).unwrap(), vec!["shell", "python"]);
    }

    #[test]
    fn status_is_a_dry_run() {
        let f = fixture();
        let plans = f.engine.status(&f.project, &shell(), &SyncOptions::default()).unwrap();

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].count(ActionKind::Adopt), 2);
        f.hub.assert_missing(&f.project, ".bashrc");
        assert!(f.hub.registry_bytes().is_none());
    }

    #[test]
    fn register_adopts_without_syncing_then_sync_uses_registered_sets() {
        let f = fixture();
        assert!(f.engine.register(&f.project, "python").unwrap());
        assert!(!f.engine.register(&f.project, "python").unwrap());
        f.hub.assert_missing(&f.project, "pyproject.toml");

        let report = f.engine.sync(&f.project, &[], &pull_only()).unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].set_name, "python");
        f.hub.assert_content(&f.project, "pyproject.toml", "[tool.ruff]\n");
    }

    #[test]
    fn register_rejects_unknown_sets() {
        let f = fixture();
        let err = f.engine.register(&f.project, "zsh").unwrap_err();
        assert!(matches!(err, Error::SetNotFound { .. }));
    }

    #[test]
    fn unregister_works_after_project_is_deleted() {
        let f = fixture();
        f.engine.sync(&f.project, &shell(), &pull_only()).unwrap();
        let key = ProjectId::resolve(&f.project).unwrap();
        fs::remove_dir_all(&f.project).unwrap();

        assert!(f.engine.unregister(key.as_str(), "shell").unwrap());
        assert!(f.engine.registry().unwrap().is_empty());
    }

    #[test]
    fn sync_all_for_set_is_best_effort() {
        let f = fixture();
        let web = f.hub.project("web");
        let gone = f.hub.project("gone");
        for project in [&f.project, &web, &gone] {
            f.engine.sync(project, &shell(), &pull_only()).unwrap();
        }
        fs::remove_dir_all(&gone).unwrap();
        f.hub.write_template("shell", ".bashrc", "export EDITOR=hx\n");

        let bulk = f.engine.sync_all_for_set("shell", &SyncOptions::default()).unwrap();

        assert_eq!(bulk.reports.len(), 2);
        assert_eq!(bulk.errors.len(), 1);
        assert!(bulk.has_failures());
        f.hub.assert_content(&f.project, ".bashrc", "export EDITOR=hx\n");
        f.hub.assert_content(&web, ".bashrc", "export EDITOR=hx\n");
    }

    #[test]
    fn resnapshot_records_agreeing_files_only() {
        let f = fixture();
        f.hub.write(&f.project, ".bashrc", "export EDITOR=vim\n");
        f.hub.write(&f.project, ".vimrc", "set nonumber\n");

        let recorded = f.engine.resnapshot(&f.project, "shell", &[]).unwrap();
        assert_eq!(recorded, vec![".bashrc".to_string()]);

        let project = ProjectId::resolve(&f.project).unwrap();
        let registry = f.engine.registry().unwrap();
        let snapshot = registry.get_snapshot(&project, "shell").unwrap();
        assert!(snapshot.digest(".bashrc").is_some());
        assert!(snapshot.digest(".vimrc").is_none());
    }

    #[test]
    fn reconcile_compares_manifest_with_registry() {
        let f = fixture();
        f.engine.register(&f.project, "shell").unwrap();
        f.hub.write(&f.project, MANIFEST_FILE, "environment_sets: [python]\n");

        let reconciliation = f.engine.reconcile(&f.project).unwrap();
        assert_eq!(reconciliation.requested_only, vec!["python"]);
        assert_eq!(reconciliation.registered_only, vec!["shell"]);
        assert!(!reconciliation.is_consistent());
    }

    #[test]
    fn prune_removes_deleted_projects_from_registry() {
        let f = fixture();
        f.engine.register(&f.project, "shell").unwrap();
        let key = ProjectId::resolve(&f.project).unwrap();
        fs::remove_dir_all(&f.project).unwrap();

        assert_eq!(f.engine.prune_missing_projects().unwrap(), vec![key]);
        assert!(f.engine.prune_missing_projects().unwrap().is_empty());
        assert_eq!(f.engine.registry().unwrap().version(), 2);
    }
}
