pub mod draft;
pub mod fields;
pub mod query;
pub mod submit;
pub mod tags;
pub mod update;

pub use draft::{
    ImageRequest,
    NoteDraft,
    NoteUpdate,
};
pub use fields::{
    canonicalize,
    canonicalize_validated,
};
pub use query::{
    delete_notes,
    find_notes,
    note_info,
    DeleteNotesResult,
    FindNotesResult,
};
pub use submit::{
    add_from_model,
    add_notes,
    SubmissionDetail,
    SubmissionResult,
    SubmissionStatus,
};
pub use tags::normalize_tags;
pub use update::{
    update_notes,
    UpdateOutcome,
    UpdateResult,
    UpdateStatus,
};
