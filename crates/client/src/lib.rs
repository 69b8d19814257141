//! Client for the remote dubbing service.
//!
//! The orchestration engine only talks to the service through the
//! [`DubbingApi`] trait; [`HttpDubbingApi`] is the `reqwest`-backed
//! implementation of it.

pub mod api;
pub mod error;
pub mod http;

pub use api::{
    Ack, Download, DownloadKind, DubbingApi, HealthResponse, LanguageOption, LanguagesResponse,
    ProgressFn, UploadFile, UploadResponse, VoiceOption,
};
pub use error::ApiError;
pub use http::HttpDubbingApi;
