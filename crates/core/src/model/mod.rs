mod course;
mod ids;
mod lesson;
mod mcq;
mod progress;

pub use ids::{ChapterId, CourseId, LessonId, ParseIdError, QuestionId, UserId};

pub use course::{Chapter, Course, CourseError, validate_chapter_order};
pub use lesson::{Lesson, LessonContent, LessonError};
pub use mcq::{McqError, McqQuestion};
pub use progress::{ProgressSnapshot, UserChapterProgress};
