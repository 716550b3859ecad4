//! Capability cache keyed by descriptor string.

use std::sync::Arc;

use ctrlink_runtime::{Capability, Descriptor, Result, Session};
use dashmap::DashMap;
use tracing::debug;

/// Memoizes one capability per distinct descriptor.
///
/// Entries are never evicted. Two concurrent misses on the same key may both
/// reach the session; the first stored capability wins and both callers get it.
pub struct ConnectionCache {
	session: Arc<dyn Session>,
	entries: DashMap<String, Arc<dyn Capability>>,
}

impl ConnectionCache {
	pub fn new(session: Arc<dyn Session>) -> Self {
		Self {
			session,
			entries: DashMap::new(),
		}
	}

	pub fn session(&self) -> &Arc<dyn Session> {
		&self.session
	}

	/// Returns the cached capability for `descriptor`, connecting on a miss.
	pub async fn get_capability(&self, descriptor: &Descriptor) -> Result<Arc<dyn Capability>> {
		let cached = self.entries.get(descriptor.as_str()).map(|e| Arc::clone(e.value()));
		if let Some(capability) = cached {
			return Ok(capability);
		}

		let capability = self.session.get_reference(descriptor).await?;
		let stored = Arc::clone(
			self.entries
				.entry(descriptor.as_str().to_string())
				.or_insert(capability)
				.value(),
		);
		debug!(target = "ctrlink.cache", descriptor = %descriptor, entries = self.entries.len(), "cached capability");
		Ok(stored)
	}

	pub fn contains(&self, descriptor: &Descriptor) -> bool {
		self.entries.contains_key(descriptor.as_str())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
