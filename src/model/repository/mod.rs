/// ctype value that marks a directory row. Chosen so that it survives
/// round-tripping through JSON clients without a separate boolean.
pub static FOLDER_CONTENT_TYPE: &str = "folder";

/// kinds of changelog entries. Only `Add` and `Erase` are produced in this
/// revision; the rest are reserved wire values.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ChangeAction {
    Add = 0,
    Trash = 1,
    Erase = 2,
    MoveOut = 3,
    MoveIn = 4,
}

impl ChangeAction {
    pub fn from_i64(value: i64) -> Option<ChangeAction> {
        match value {
            0 => Some(ChangeAction::Add),
            1 => Some(ChangeAction::Trash),
            2 => Some(ChangeAction::Erase),
            3 => Some(ChangeAction::MoveOut),
            4 => Some(ChangeAction::MoveIn),
            _ => None,
        }
    }
}

/// everything the filesystem tells us about a single item; rows in the
/// `files` table are populated from this shape
#[derive(Debug, PartialEq, Clone)]
pub struct ProbedItem {
    pub name: String,
    pub is_dir: bool,
    /// bytes for files, count of immediate children for directories
    pub size: i64,
    pub ctype: String,
    pub cdate: i64,
    pub mdate: i64,
}
