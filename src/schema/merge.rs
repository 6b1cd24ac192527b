//! Merge engine: reconciles the schema already in the repository with the one
//! a machine just produced.
//!
//! Rules, per section:
//!
//! - `systems`: union by machine id. Existing order is kept and incoming-only
//!   machines are appended. For a shared machine every incoming field wins,
//!   falling back to the existing value when the incoming one is absent.
//! - `dotfiles`: union by machine id. For a shared machine, tracked files are
//!   deduplicated first-write-wins (see [`crate::tracking`]) while the
//!   package, extension and runtime inventories are replaced wholesale, since
//!   they are regenerated on every run. Tracked files accumulate manual
//!   additions, inventories do not.
//! - `metadata`: `updatedAt` becomes the merge time, `createdAt` keeps the
//!   existing value.
//! - unmodelled keys of the document, a system or a machine: union, incoming
//!   wins per key. A tracked file keeps the extra keys of the entry that
//!   wins deduplication.
//!
//! With a fixed merge time the result is idempotent:
//! `merge(merge(a, b), b) == merge(a, b)`.
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::types::{
    BackupConfig, DesktopMetadata, ExtraFields, MachineConfig, RepoInfo, SchemaMetadata,
    SystemMetadata, TrackedFile,
};
use crate::tracking;

/// Merge `incoming` into `existing`, stamping the result with the current time.
#[must_use]
pub fn merge_configs(existing: &BackupConfig, incoming: &BackupConfig) -> BackupConfig {
    merge_configs_at(existing, incoming, Utc::now())
}

/// Merge `incoming` into `existing`, stamping the result with `now`.
#[must_use]
pub fn merge_configs_at(
    existing: &BackupConfig,
    incoming: &BackupConfig,
    now: DateTime<Utc>,
) -> BackupConfig {
    let version = if incoming.version.is_empty() {
        existing.version.clone()
    } else {
        incoming.version.clone()
    };

    let mut dotfiles = existing.dotfiles.clone();
    for (id, machine) in &incoming.dotfiles {
        let merged = match dotfiles.get(id) {
            Some(current) => merge_machine(current, machine),
            None => machine.clone(),
        };
        dotfiles.insert(id.clone(), merged);
    }

    BackupConfig {
        version,
        metadata: SchemaMetadata {
            created_at: existing.metadata.created_at,
            updated_at: now,
        },
        repo: merge_repo(&existing.repo, &incoming.repo),
        systems: merge_systems(&existing.systems, &incoming.systems),
        dotfiles,
        extra: merge_extra(&existing.extra, &incoming.extra),
    }
}

fn pick<T: Clone>(incoming: Option<&T>, existing: Option<&T>) -> Option<T> {
    incoming.or(existing).cloned()
}

fn pick_str(incoming: &str, existing: &str) -> String {
    if incoming.is_empty() {
        existing.to_string()
    } else {
        incoming.to_string()
    }
}

fn merge_repo(existing: &RepoInfo, incoming: &RepoInfo) -> RepoInfo {
    RepoInfo {
        repo_type: pick(incoming.repo_type.as_ref(), existing.repo_type.as_ref()),
        repo_name: pick(incoming.repo_name.as_ref(), existing.repo_name.as_ref()),
        repo_url: pick(incoming.repo_url.as_ref(), existing.repo_url.as_ref()),
        repo_owner: pick(incoming.repo_owner.as_ref(), existing.repo_owner.as_ref()),
        branch: pick(incoming.branch.as_ref(), existing.branch.as_ref()),
        visibility: pick(incoming.visibility.as_ref(), existing.visibility.as_ref()),
        token: pick(incoming.token.as_ref(), existing.token.as_ref()),
    }
}

fn merge_systems(existing: &[SystemMetadata], incoming: &[SystemMetadata]) -> Vec<SystemMetadata> {
    let incoming_by_id: HashMap<&str, &SystemMetadata> = incoming
        .iter()
        .map(|s| (s.machine_id.as_str(), s))
        .collect();

    let mut merged: Vec<SystemMetadata> = existing
        .iter()
        .map(|current| match incoming_by_id.get(current.machine_id.as_str()) {
            Some(update) => merge_system(current, update),
            None => current.clone(),
        })
        .collect();

    for system in incoming {
        if !merged.iter().any(|s| s.machine_id == system.machine_id) {
            merged.push(system.clone());
        }
    }
    merged
}

fn merge_system(existing: &SystemMetadata, incoming: &SystemMetadata) -> SystemMetadata {
    SystemMetadata {
        os: pick_str(&incoming.os, &existing.os),
        distro: pick_str(&incoming.distro, &existing.distro),
        nickname: pick_str(&incoming.nickname, &existing.nickname),
        machine_id: existing.machine_id.clone(),
        shell: pick(incoming.shell.as_ref(), existing.shell.as_ref()),
        shell_config_file: pick(
            incoming.shell_config_file.as_ref(),
            existing.shell_config_file.as_ref(),
        ),
        desktop: merge_desktop(existing.desktop.as_ref(), incoming.desktop.as_ref()),
        extra: merge_extra(&existing.extra, &incoming.extra),
    }
}

fn merge_extra(existing: &ExtraFields, incoming: &ExtraFields) -> ExtraFields {
    let mut merged = existing.clone();
    merged.extend(incoming.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

fn merge_desktop(
    existing: Option<&DesktopMetadata>,
    incoming: Option<&DesktopMetadata>,
) -> Option<DesktopMetadata> {
    match (existing, incoming) {
        (Some(old), Some(new)) => Some(DesktopMetadata {
            environment: pick(new.environment.as_ref(), old.environment.as_ref()),
            session_type: pick(new.session_type.as_ref(), old.session_type.as_ref()),
        }),
        (old, new) => pick(new, old),
    }
}

fn merge_machine(existing: &MachineConfig, incoming: &MachineConfig) -> MachineConfig {
    let mut tracked_files = existing.tracked_files.clone();
    for file in &mut tracked_files {
        if let Some(update) = incoming
            .tracked_files
            .iter()
            .find(|f| f.source_path == file.source_path)
        {
            carry_demotion(file, update);
        }
    }

    let mut merged = MachineConfig {
        tracked_files,
        secrets: incoming.secrets.clone(),
        symlinks: incoming.symlinks,
        packages: pick(incoming.packages.as_ref(), existing.packages.as_ref()),
        extensions: pick(incoming.extensions.as_ref(), existing.extensions.as_ref()),
        runtimes: pick(incoming.runtimes.as_ref(), existing.runtimes.as_ref()),
        extra: merge_extra(&existing.extra, &incoming.extra),
    };
    tracking::add_tracked_files(&mut merged, incoming.tracked_files.iter().cloned());
    merged
}

/// A file judged unsafe on the incoming side stays untracked after the merge,
/// even though the existing entry is the one kept.
fn carry_demotion(kept: &mut TrackedFile, incoming: &TrackedFile) {
    if kept.tracked && !incoming.tracked {
        kept.tracked = false;
        if incoming.secret_scan.is_some() {
            kept.secret_scan = incoming.secret_scan;
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::schema::types::{Package, ScanOutcome, SecretScanRecord};
    use std::collections::BTreeMap;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn system(os: &str, distro: &str, nick: &str) -> SystemMetadata {
        SystemMetadata {
            os: os.to_string(),
            distro: distro.to_string(),
            nickname: nick.to_string(),
            machine_id: format!("{os}-{distro}-{nick}"),
            shell: Some("zsh".to_string()),
            shell_config_file: Some(".zshrc".to_string()),
            desktop: None,
            extra: ExtraFields::new(),
        }
    }

    fn machine(files: &[(&str, &str)], id: &str) -> MachineConfig {
        MachineConfig {
            tracked_files: files
                .iter()
                .map(|(name, src)| TrackedFile::new(name, src, id))
                .collect(),
            ..MachineConfig::default()
        }
    }

    fn config(created: &str, systems: &[SystemMetadata]) -> BackupConfig {
        let mut c = BackupConfig::new(ts(created));
        for s in systems {
            let files = [(".zshrc", "~/.zshrc")];
            c.upsert_machine(s.clone(), machine(&files, &s.machine_id));
        }
        c
    }

    #[test]
    fn disjoint_union_size_is_sum() {
        let a = config(
            "2026-01-01T00:00:00Z",
            &[system("linux", "arch", "desk"), system("linux", "debian", "srv")],
        );
        let b = config("2026-02-01T00:00:00Z", &[system("macos", "darwin", "mbp")]);
        let now = ts("2026-03-01T00:00:00Z");

        assert_eq!(merge_configs_at(&a, &b, now).systems.len(), 3);
        assert_eq!(merge_configs_at(&b, &a, now).systems.len(), 3);
        assert_eq!(merge_configs_at(&a, &b, now).dotfiles.len(), 3);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut a = config("2026-01-01T00:00:00Z", &[system("linux", "arch", "desk")]);
        a.dotfiles
            .get_mut("linux-arch-desk")
            .unwrap()
            .tracked_files
            .push(TrackedFile::new(".vimrc", "~/.vimrc", "linux-arch-desk"));
        let mut b = config(
            "2026-02-01T00:00:00Z",
            &[system("linux", "arch", "desk"), system("macos", "darwin", "mbp")],
        );
        b.dotfiles
            .get_mut("linux-arch-desk")
            .unwrap()
            .tracked_files
            .push(TrackedFile::new("nvim", "~/.config/nvim", "linux-arch-desk"));
        let now = ts("2026-03-01T00:00:00Z");

        let once = merge_configs_at(&a, &b, now);
        let twice = merge_configs_at(&once, &b, now);
        assert_eq!(once, twice);
    }

    #[test]
    fn incoming_fields_win_for_shared_machine() {
        let a = config("2026-01-01T00:00:00Z", &[system("linux", "arch", "desk")]);
        let mut updated = system("linux", "arch", "desk");
        updated.shell = Some("fish".to_string());
        updated.shell_config_file = None;
        let b = config("2026-02-01T00:00:00Z", &[updated]);

        let merged = merge_configs_at(&a, &b, ts("2026-03-01T00:00:00Z"));
        let s = merged.system("linux-arch-desk").unwrap();
        assert_eq!(s.shell.as_deref(), Some("fish"));
        assert_eq!(s.shell_config_file.as_deref(), Some(".zshrc"));
        assert_eq!(merged.systems.len(), 1);
    }

    #[test]
    fn created_at_preserved_and_updated_at_is_merge_time() {
        let a = config("2026-01-01T00:00:00Z", &[]);
        let b = config("2026-02-01T00:00:00Z", &[]);
        let now = ts("2026-03-01T00:00:00Z");
        let merged = merge_configs_at(&a, &b, now);
        assert_eq!(merged.metadata.created_at, ts("2026-01-01T00:00:00Z"));
        assert_eq!(merged.metadata.updated_at, now);
    }

    #[test]
    fn existing_order_kept_and_new_systems_appended() {
        let a = config(
            "2026-01-01T00:00:00Z",
            &[system("linux", "arch", "b"), system("linux", "arch", "a")],
        );
        let b = config(
            "2026-02-01T00:00:00Z",
            &[system("linux", "arch", "c"), system("linux", "arch", "a")],
        );
        let merged = merge_configs_at(&a, &b, ts("2026-03-01T00:00:00Z"));
        let ids: Vec<&str> = merged.systems.iter().map(|s| s.machine_id.as_str()).collect();
        assert_eq!(ids, vec!["linux-arch-b", "linux-arch-a", "linux-arch-c"]);
    }

    #[test]
    fn tracked_files_accumulate_first_write_wins() {
        let id = "linux-arch-desk";
        let mut a = config("2026-01-01T00:00:00Z", &[system("linux", "arch", "desk")]);
        a.dotfiles.get_mut(id).unwrap().tracked_files[0].symlink = false;

        let mut b = config("2026-02-01T00:00:00Z", &[system("linux", "arch", "desk")]);
        b.dotfiles
            .get_mut(id)
            .unwrap()
            .tracked_files
            .push(TrackedFile::new(".gitconfig", "~/.gitconfig", id));

        let merged = merge_configs_at(&a, &b, ts("2026-03-01T00:00:00Z"));
        let files = &merged.dotfiles[id].tracked_files;
        assert_eq!(files.len(), 2);
        assert!(!files[0].symlink, "existing entry is kept as-is");
        assert_eq!(files[1].source_path, "~/.gitconfig");
    }

    #[test]
    fn incoming_demotion_is_carried_onto_kept_entry() {
        let id = "linux-arch-desk";
        let a = config("2026-01-01T00:00:00Z", &[system("linux", "arch", "desk")]);
        let mut b = config("2026-02-01T00:00:00Z", &[system("linux", "arch", "desk")]);
        let scanned_at = ts("2026-02-01T00:00:00Z");
        {
            let f = &mut b.dotfiles.get_mut(id).unwrap().tracked_files[0];
            f.tracked = false;
            f.secret_scan = Some(SecretScanRecord {
                outcome: ScanOutcome::SecretsFound,
                scanned_at,
            });
        }

        let merged = merge_configs_at(&a, &b, ts("2026-03-01T00:00:00Z"));
        let f = &merged.dotfiles[id].tracked_files[0];
        assert!(!f.tracked);
        assert_eq!(f.secret_scan.unwrap().outcome, ScanOutcome::SecretsFound);
    }

    #[test]
    fn inventories_replaced_wholesale() {
        let id = "linux-arch-desk";
        let mut a = config("2026-01-01T00:00:00Z", &[system("linux", "arch", "desk")]);
        let mut old = BTreeMap::new();
        old.insert(
            "pacman".to_string(),
            vec![
                Package {
                    name: "vim".to_string(),
                    version: None,
                },
                Package {
                    name: "htop".to_string(),
                    version: None,
                },
            ],
        );
        a.dotfiles.get_mut(id).unwrap().packages = Some(old);

        let mut b = config("2026-02-01T00:00:00Z", &[system("linux", "arch", "desk")]);
        let mut new = BTreeMap::new();
        new.insert(
            "pacman".to_string(),
            vec![Package {
                name: "neovim".to_string(),
                version: Some("0.10".to_string()),
            }],
        );
        b.dotfiles.get_mut(id).unwrap().packages = Some(new.clone());

        let merged = merge_configs_at(&a, &b, ts("2026-03-01T00:00:00Z"));
        assert_eq!(merged.dotfiles[id].packages, Some(new));
    }

    #[test]
    fn absent_incoming_inventory_keeps_existing() {
        let id = "linux-arch-desk";
        let mut a = config("2026-01-01T00:00:00Z", &[system("linux", "arch", "desk")]);
        let mut ext = BTreeMap::new();
        ext.insert("vscode".to_string(), vec!["rust-lang.rust-analyzer".to_string()]);
        a.dotfiles.get_mut(id).unwrap().extensions = Some(ext.clone());
        let b = config("2026-02-01T00:00:00Z", &[system("linux", "arch", "desk")]);

        let merged = merge_configs_at(&a, &b, ts("2026-03-01T00:00:00Z"));
        assert_eq!(merged.dotfiles[id].extensions, Some(ext));
    }

    #[test]
    fn repo_fields_fall_back_to_existing() {
        let mut a = config("2026-01-01T00:00:00Z", &[]);
        a.repo.repo_url = Some("git@github.com:me/dots.git".to_string());
        a.repo.branch = Some("main".to_string());
        let mut b = config("2026-02-01T00:00:00Z", &[]);
        b.repo.branch = Some("backup".to_string());

        let merged = merge_configs_at(&a, &b, ts("2026-03-01T00:00:00Z"));
        assert_eq!(merged.repo.repo_url.as_deref(), Some("git@github.com:me/dots.git"));
        assert_eq!(merged.repo.branch.as_deref(), Some("backup"));
    }

    #[test]
    fn unmodelled_keys_survive_with_incoming_winning() {
        let id = "linux-arch-desk";
        let a: BackupConfig = serde_json::from_value(serde_json::json!({
            "version": "1.0.0",
            "metadata": {"createdAt": "2026-01-01T00:00:00Z", "updatedAt": "2026-01-01T00:00:00Z"},
            "systems": [{"os": "linux", "distro": "arch", "nickname": "desk",
                         "machineId": id, "extraSys": 1, "arch": "x86_64"}],
            "dotfiles": {"linux-arch-desk": {
                "trackedFiles": [{"name": ".zshrc", "sourcePath": "~/.zshrc",
                                  "repoPath": "linux-arch-desk/.zshrc", "category": "shell"}],
                "vscodeSettings": {"editor.fontSize": 13}
            }},
            "notes": "kept"
        }))
        .unwrap();
        let mut b = config("2026-02-01T00:00:00Z", &[system("linux", "arch", "desk")]);
        b.systems[0]
            .extra
            .insert("arch".to_string(), serde_json::json!("aarch64"));

        let merged = merge_configs_at(&a, &b, ts("2026-03-01T00:00:00Z"));

        assert_eq!(merged.extra["notes"], "kept");
        assert_eq!(merged.systems[0].extra["extraSys"], 1);
        assert_eq!(merged.systems[0].extra["arch"], "aarch64");
        let machine = &merged.dotfiles[id];
        assert_eq!(machine.extra["vscodeSettings"]["editor.fontSize"], 13);
        assert_eq!(machine.tracked_files[0].extra["category"], "shell");

        let again = merge_configs_at(&merged, &b, ts("2026-03-01T00:00:00Z"));
        assert_eq!(again, merged);
    }
}
