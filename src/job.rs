use std::fmt;

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::Pid;

pub trait WaitStatusExt {
	/// Exit code of a terminated child; `128 + signal` when it was killed.
	fn code(self) -> Option<i32>;
}

impl WaitStatusExt for WaitStatus {
	fn code(self) -> Option<i32> {
		match self {
			WaitStatus::Exited(_, code) => Some(code),
			WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
			_ => None,
		}
	}
}

/// One spawned stage. `status` stays `StillAlive` until the child is reaped.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Process {
	pub name: String,
	pub pid: Pid,
	pub status: WaitStatus,
}

impl Process {
	pub fn code(&self) -> i32 {
		self.status.code().unwrap_or(-1)
	}
}

impl fmt::Display for Process {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{} exit status: {}", self.name, self.code())
	}
}

/// The children of one pipeline, kept in stage order.
#[derive(Debug, Default)]
pub struct Job {
	pub processes: Vec<Process>,
}

impl Job {
	pub fn new(size_hint: usize) -> Job {
		Job { processes: Vec::with_capacity(size_hint) }
	}

	pub fn push(&mut self, name: &[u8], pid: Pid) {
		let name = String::from_utf8_lossy(name).into_owned();
		self.processes.push(Process { name: name, pid: pid, status: WaitStatus::StillAlive });
	}

	/// Blocks on each child in stage order, regardless of the order in which
	/// they actually terminate.
	pub fn wait(&mut self) {
		for pr in self.processes.iter_mut() {
			pr.status = wait_terminated(pr.pid);
			debug!("{} (pid {}) finished: {:?}", pr.name, pr.pid, pr.status);
		}
	}

	/// Exit code of the last stage, the one the pipeline as a whole reports.
	pub fn last_code(&self) -> Option<i32> {
		self.processes.last().map(Process::code)
	}
}

fn wait_terminated(pid: Pid) -> WaitStatus {
	loop {
		match wait::waitpid(pid, None) {
			Ok(status) if status.code().is_some() => return status,
			Ok(_) => continue,
			Err(Errno::EINTR) => continue,
			Err(e) => {
				warn!("waitpid({}) failed: {}", pid, e);
				return WaitStatus::StillAlive;
			},
		}
	}
}
