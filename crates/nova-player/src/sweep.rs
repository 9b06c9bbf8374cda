//! Startup sweep for player processes left over from a previous run.
//!
//! Purely a live scan of the OS process table; nothing is persisted.
//! Matching is heuristic (binary name plus the `--intf dummy` invocation
//! marker), so an unrelated process sharing both is a known false
//! positive we accept.

use sysinfo::System;
use tracing::{info, warn};

const PLAYER_PROCESS_NAMES: &[&str] = &["vlc", "cvlc"];
const INVOCATION_MARKER: &str = "--intf dummy";

fn is_orphan(name: &str, cmdline: &str) -> bool {
    PLAYER_PROCESS_NAMES.contains(&name) && cmdline.contains(INVOCATION_MARKER)
}

fn find_orphans(processes: impl IntoIterator<Item = (u32, String, String)>) -> Vec<u32> {
    processes
        .into_iter()
        .filter(|(_, name, cmdline)| is_orphan(name, cmdline))
        .map(|(pid, _, _)| pid)
        .collect()
}

/// Force-kill leftover player processes from prior runs.  Best-effort:
/// per-process failures are logged and skipped, never fatal to startup.
/// Returns the number of processes killed.  Run once, before any
/// supervisor exists.
pub fn sweep() -> usize {
    let sys = System::new_all();
    let orphans = find_orphans(sys.processes().iter().map(|(pid, process)| {
        (
            pid.as_u32(),
            process.name().to_string(),
            process.cmd().join(" "),
        )
    }));

    let mut killed = 0;
    for pid in orphans {
        let Some(process) = sys.process(sysinfo::Pid::from_u32(pid)) else {
            continue;
        };
        info!(pid, name = process.name(), "killing orphaned player process");
        if process.kill() {
            killed += 1;
        } else {
            warn!(pid, name = process.name(), "could not kill orphaned process, skipping");
        }
    }

    if killed > 0 {
        info!(killed, "orphan sweep finished");
    }
    killed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc(pid: u32, name: &str, cmdline: &str) -> (u32, String, String) {
        (pid, name.to_string(), cmdline.to_string())
    }

    #[test]
    fn matches_exactly_the_marked_player_processes() {
        let table = vec![
            proc(101, "cvlc", "cvlc --intf dummy --quiet https://a"),
            proc(102, "vlc", "vlc --intf dummy --quiet https://b"),
            proc(103, "firefox", "firefox --new-window"),
            // player binary without our invocation marker: user's own vlc
            proc(104, "vlc", "vlc /home/user/movie.mkv"),
            // marker without the binary name
            proc(105, "mplayer", "mplayer --intf dummy"),
        ];

        let mut orphans = find_orphans(table);
        orphans.sort_unstable();
        assert_eq!(orphans, vec![101, 102]);
    }

    #[test]
    fn empty_table_yields_no_orphans() {
        assert!(find_orphans(Vec::new()).is_empty());
    }
}
