#[derive(Debug, PartialEq)]
pub enum ProbeError {
    /// stat failed; the path does not exist or is unreadable
    NotFound,
    /// neither a regular file nor a directory (symlink, device, socket...)
    Skipped,
}
