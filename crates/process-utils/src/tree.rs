//! Process table queries and signalling backed by `sysinfo`.

use std::collections::VecDeque;

use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, Signal, System};
use tracing::{debug, trace};

fn snapshot() -> System {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system
}

/// Check whether `pid` is present in the OS process table and not a zombie.
///
/// This does not rely on any handle the caller may hold, so it also detects
/// processes that disappeared out-of-band (sandboxed launches, external kills).
pub fn is_process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    match system.process(pid) {
        Some(process) => !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
        None => false,
    }
}

/// Check whether `pid` still has an entry in the OS process table.
///
/// Unlike [`is_process_alive`] a zombie counts: an exited child keeps its
/// entry until its parent reaps it, so a supervisor that owns the child
/// sees it here until its own wait has collected the exit status.
pub fn process_exists(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    system
        .process(pid)
        .is_some_and(|process| process.status() != ProcessStatus::Dead)
}

/// Deliver an interrupt (SIGINT) to `pid`.
///
/// Returns `false` when the process does not exist or the platform has no
/// interrupt signal (Windows), in which case callers fall back to another
/// graceful mechanism.
pub fn send_interrupt(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    let Some(process) = system.process(pid) else {
        return false;
    };

    match process.kill_with(Signal::Interrupt) {
        Some(sent) => sent,
        None => {
            debug!(pid = pid.as_u32(), "interrupt signal unsupported on this platform");
            false
        }
    }
}

/// All transitive children of `pid`, ordered parents before children.
pub fn descendants(pid: u32) -> Vec<u32> {
    let system = snapshot();
    collect_descendants(&system, Pid::from_u32(pid))
        .into_iter()
        .map(|p| p.as_u32())
        .collect()
}

fn collect_descendants(system: &System, root: Pid) -> Vec<Pid> {
    let mut found = Vec::new();
    let mut queue = VecDeque::from([root]);

    while let Some(parent) = queue.pop_front() {
        for (child_pid, process) in system.processes() {
            if process.parent() == Some(parent) && *child_pid != root && !found.contains(child_pid) {
                found.push(*child_pid);
                queue.push_back(*child_pid);
            }
        }
    }

    found
}

/// Forcefully kill `pid` together with every process it spawned.
///
/// Children are killed deepest-first so that a dying parent cannot respawn
/// them. Returns the number of processes a kill was delivered to.
pub fn kill_tree(pid: u32) -> usize {
    let system = snapshot();
    let root = Pid::from_u32(pid);
    let mut killed = 0;

    for child in collect_descendants(&system, root).into_iter().rev() {
        if let Some(process) = system.process(child)
            && process.kill()
        {
            trace!(pid = child.as_u32(), parent = pid, "killed child process");
            killed += 1;
        }
    }

    if let Some(process) = system.process(root)
        && process.kill()
    {
        killed += 1;
    }

    debug!(pid, killed, "process tree kill issued");
    killed
}
