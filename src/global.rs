use crate::search;

/// State that outlives a single input line.
pub struct State {
	pub search_cache: search::SearchCache,
}

impl State {
	pub fn new() -> State {
		let search_cache = search::SearchCache::new();
		State { search_cache: search_cache }
	}
}
