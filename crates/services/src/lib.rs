#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod progression;
pub mod rest_client;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use config::{Backend, ServicesConfig};
pub use error::{AppServicesError, ProgressionError};
pub use progression::{
    ChapterView, CourseView, LessonView, McqAnswer, McqStart, PendingWrite, ProgressionService,
};
pub use rest_client::RestBackend;
