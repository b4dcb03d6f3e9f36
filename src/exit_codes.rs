/// Process exit codes for the `reloc` binary.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    /// At least one file failed to move or validate.
    pub const OPERATIONAL_FAILURE: i32 = 1;
    /// The journal could not be written; execution stopped early.
    pub const JOURNAL_FAILURE: i32 = 2;
    /// Rollback left some files unrestored.
    pub const ROLLBACK_INCOMPLETE: i32 = 3;
}
