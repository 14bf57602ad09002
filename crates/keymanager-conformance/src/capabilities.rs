/// Optional store behaviours exercised by the suites.
#[derive(Clone, Copy, Debug, Default)]
pub struct Capabilities {
    /// `get`/`list` answer from the store itself.
    pub read: bool,
    /// Deleted items can be brought back.
    pub restore: bool,
    /// Deleted items can be purged.
    pub destroy: bool,
    /// Destroying an active item fails with `status_conflict`.
    pub strict_destroy: bool,
}

impl Capabilities {
    /// Every behaviour, as offered by the persistence backed connectors.
    pub const fn full() -> Self {
        Self {
            read: true,
            restore: true,
            destroy: true,
            strict_destroy: true,
        }
    }

    pub const fn with_read(mut self) -> Self {
        self.read = true;
        self
    }

    pub const fn with_restore(mut self) -> Self {
        self.restore = true;
        self
    }

    pub const fn with_destroy(mut self) -> Self {
        self.destroy = true;
        self
    }
}
