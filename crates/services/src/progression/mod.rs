//! Course progression: local-first progress updates over a `ProgressStore`.

mod pending;
mod service;
mod view;

pub use pending::PendingWrite;
pub use service::{McqAnswer, McqStart, ProgressionService};
pub use view::{ChapterView, CourseView, LessonView};
