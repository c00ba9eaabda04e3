use std::collections::HashMap;
use std::ffi::{CString, OsStr, OsString};
use std::path::Path;
use std::{env, fs, io};

use log::debug;

/// Maps program names to their full path under the directories of `PATH`.
pub struct SearchCache {
	imp: HashMap<CString, CString>,
	path: Option<OsString>,
}

const PATH_KEY: &'static str = "PATH";

impl SearchCache {
	pub fn new() -> SearchCache {
		SearchCache::with_path(env::var_os(PATH_KEY))
	}

	pub fn with_path(path: Option<OsString>) -> SearchCache {
		let mut this = SearchCache { imp: HashMap::new(), path: path };
		this.rehash();
		this
	}

	fn is_executable(path: &Path) -> bool {
		use std::os::unix::fs::PermissionsExt;
		match fs::metadata(path) {
			Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
			Err(_) => false,
		}
	}

	fn add_entry(&mut self, entry: io::Result<fs::DirEntry>) -> io::Result<()> {
		use std::os::unix::ffi::OsStringExt;
		let e = entry?;
		if !SearchCache::is_executable(&e.path()) {
			return Ok(());
		}
		let file_name = CString::new(e.file_name().into_vec())?;
		let path = CString::new(e.path().into_os_string().into_vec())?;
		self.imp.entry(file_name).or_insert(path);
		Ok(())
	}

	pub fn rehash(&mut self) {
		self.imp.clear();
		let path = match self.path.take() {
			Some(p) => p,
			None => return,
		};
		for dir in env::split_paths(&path) {
			if let Ok(entries) = fs::read_dir(dir) {
				for entry in entries {
					let _ = self.add_entry(entry);
				}
			}
		}
		self.path = Some(path);
		debug!("search cache holds {} programs", self.imp.len());
	}

	pub fn lookup(&self, name: &CString) -> Option<&CString> {
		self.imp.get(name)
	}

	/// Resolves the program a command names. Names containing a slash are
	/// taken as paths; anything else goes through the cache, which is rebuilt
	/// once on a miss.
	pub fn resolve(&mut self, name: &CString) -> Option<CString> {
		use std::os::unix::ffi::OsStrExt;
		if name.as_bytes().contains(&b'/') {
			return Some(name.clone());
		}
		if self.lookup(name).is_none() {
			debug!("{:?} not cached, rehashing", OsStr::from_bytes(name.as_bytes()));
			self.rehash();
		}
		self.lookup(name).cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cstr(s: &str) -> CString {
		CString::new(s).unwrap()
	}

	fn write_mode(path: &Path, mode: u32) {
		use std::os::unix::fs::PermissionsExt;
		fs::write(path, b"").unwrap();
		fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
	}

	fn write_executable(path: &Path) {
		write_mode(path, 0o755);
	}

	#[test]
	fn slash_names_are_paths() {
		let mut cache = SearchCache::with_path(None);
		assert_eq!(cache.resolve(&cstr("/no/such/binary")), Some(cstr("/no/such/binary")));
		assert_eq!(cache.resolve(&cstr("./run")), Some(cstr("./run")));
	}

	#[test]
	fn first_directory_wins() {
		let first = tempfile::tempdir().unwrap();
		let second = tempfile::tempdir().unwrap();
		write_executable(&first.path().join("tool"));
		write_executable(&second.path().join("tool"));
		write_executable(&second.path().join("other"));
		let path = env::join_paths(vec![first.path(), second.path()]).unwrap();

		let mut cache = SearchCache::with_path(Some(path));
		let tool = first.path().join("tool");
		assert_eq!(cache.resolve(&cstr("tool")), Some(cstr(tool.to_str().unwrap())));
		let other = second.path().join("other");
		assert_eq!(cache.resolve(&cstr("other")), Some(cstr(other.to_str().unwrap())));
	}

	#[test]
	fn miss_rehashes() {
		let dir = tempfile::tempdir().unwrap();
		let mut cache = SearchCache::with_path(Some(OsString::from(dir.path())));
		assert_eq!(cache.resolve(&cstr("late")), None);
		write_executable(&dir.path().join("late"));
		assert!(cache.resolve(&cstr("late")).is_some());
	}

	#[test]
	fn skips_non_executables_and_directories() {
		let first = tempfile::tempdir().unwrap();
		let second = tempfile::tempdir().unwrap();
		write_mode(&first.path().join("tool"), 0o644);
		fs::create_dir(first.path().join("dirtool")).unwrap();
		write_executable(&second.path().join("tool"));
		write_executable(&second.path().join("dirtool"));
		let path = env::join_paths(vec![first.path(), second.path()]).unwrap();

		let mut cache = SearchCache::with_path(Some(path));
		let tool = second.path().join("tool");
		assert_eq!(cache.resolve(&cstr("tool")), Some(cstr(tool.to_str().unwrap())));
		let dirtool = second.path().join("dirtool");
		assert_eq!(cache.resolve(&cstr("dirtool")), Some(cstr(dirtool.to_str().unwrap())));
	}

	#[test]
	fn only_non_executable_resolves_nothing() {
		let dir = tempfile::tempdir().unwrap();
		write_mode(&dir.path().join("data"), 0o644);
		let mut cache = SearchCache::with_path(Some(OsString::from(dir.path())));
		assert_eq!(cache.resolve(&cstr("data")), None);
	}

	#[test]
	fn missing_path_resolves_nothing() {
		let mut cache = SearchCache::with_path(None);
		assert_eq!(cache.resolve(&cstr("sh")), None);
	}
}
