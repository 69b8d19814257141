//! Job lifecycle status and its ordering.
//!
//! Each variant's discriminant is its position in the processing
//! progression (1-based), so comparing two statuses compares how far the
//! job has advanced. `Failed` sorts last but is reachable from any
//! non-terminal status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Numeric position of a status in the progression.
pub type StatusRank = i16;

/// A raw status value that does not name any known status.
///
/// Never silently mapped to a default: treating an unknown value as
/// `pending` would restart polling for a job that already finished.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized job status: {raw:?}")]
pub struct DecodeError {
    pub raw: String,
}

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Every variant in progression order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Position of this status in the progression.
            pub fn rank(self) -> StatusRank {
                self as StatusRank
            }

            /// Wire name used by the processing service.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $wire ),+
                }
            }

            /// Decode a raw wire value into the closed enum.
            pub fn decode(raw: &str) -> Result<Self, DecodeError> {
                match raw {
                    $( $wire => Ok($name::$variant), )+
                    other => Err(DecodeError { raw: other.to_string() }),
                }
            }
        }

        impl From<$name> for StatusRank {
            fn from(value: $name) -> Self {
                value as StatusRank
            }
        }

        impl FromStr for $name {
            type Err = DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::decode(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::decode(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_status_enum! {
    /// Dubbing job lifecycle status.
    JobStatus {
        Pending = 1 => "pending",
        Uploading = 2 => "uploading",
        Transcribing = 3 => "transcribing",
        Transcribed = 4 => "transcribed",
        GeneratingVoice = 5 => "generating_voice",
        VoiceGenerated = 6 => "voice_generated",
        Merging = 7 => "merging",
        Completed = 8 => "completed",
        Failed = 9 => "failed",
    }
}

/// How a status relates to remote work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// A remote operation is in flight; the job must be polled.
    Active,
    /// The last operation finished and the job awaits the next request.
    Idle,
    /// No further transition will occur.
    Terminal,
}

impl JobStatus {
    pub fn class(self) -> StatusClass {
        match self {
            JobStatus::Uploading
            | JobStatus::Transcribing
            | JobStatus::GeneratingVoice
            | JobStatus::Merging => StatusClass::Active,
            JobStatus::Pending | JobStatus::Transcribed | JobStatus::VoiceGenerated => {
                StatusClass::Idle
            }
            JobStatus::Completed | JobStatus::Failed => StatusClass::Terminal,
        }
    }

    pub fn is_active(self) -> bool {
        self.class() == StatusClass::Active
    }

    pub fn is_idle(self) -> bool {
        self.class() == StatusClass::Idle
    }

    pub fn is_terminal(self) -> bool {
        self.class() == StatusClass::Terminal
    }

    /// Whether the service may legally move a job from `self` to `next`.
    ///
    /// Forward moves along the progression are allowed; `Failed` is
    /// reachable from every non-terminal status. Terminal statuses never
    /// move.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == JobStatus::Failed || next > self
    }
}

/// A server-mutating request the client can issue against a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Transcribe,
    GenerateVoice,
    Merge,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Transcribe => "transcribe",
            Action::GenerateVoice => "generate_voice",
            Action::Merge => "merge",
        }
    }

    /// Statuses from which the processing service accepts this action.
    pub fn allowed_from(self, status: JobStatus) -> bool {
        match self {
            Action::Transcribe => matches!(status, JobStatus::Pending | JobStatus::Transcribed),
            Action::GenerateVoice => {
                matches!(status, JobStatus::Transcribed | JobStatus::VoiceGenerated)
            }
            Action::Merge => status == JobStatus::VoiceGenerated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_follow_progression() {
        assert_eq!(JobStatus::Pending.rank(), 1);
        assert_eq!(JobStatus::Transcribed.rank(), 4);
        assert_eq!(JobStatus::Merging.rank(), 7);
        assert_eq!(JobStatus::Failed.rank(), 9);
        let ranks: Vec<_> = JobStatus::ALL.iter().map(|s| s.rank()).collect();
        assert_eq!(ranks, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn decode_every_wire_name() {
        for status in JobStatus::ALL {
            assert_eq!(JobStatus::decode(status.as_str()), Ok(*status));
        }
    }

    #[test]
    fn decode_unknown_value_fails() {
        let err = JobStatus::decode("queued").unwrap_err();
        assert_eq!(err.raw, "queued");
        assert!(JobStatus::decode("").is_err());
        assert!(JobStatus::decode("COMPLETED").is_err());
    }

    #[test]
    fn deserialize_rejects_unknown_status() {
        let ok: JobStatus = serde_json::from_str("\"voice_generated\"").unwrap();
        assert_eq!(ok, JobStatus::VoiceGenerated);

        let err = serde_json::from_str::<JobStatus>("\"archived\"").unwrap_err();
        assert!(err.to_string().contains("archived"));
    }

    #[test]
    fn serializes_to_wire_name() {
        let json = serde_json::to_string(&JobStatus::GeneratingVoice).unwrap();
        assert_eq!(json, "\"generating_voice\"");
    }

    #[test]
    fn ordering_matches_progression() {
        assert!(JobStatus::Pending < JobStatus::Uploading);
        assert!(JobStatus::Transcribed < JobStatus::GeneratingVoice);
        assert!(JobStatus::Merging < JobStatus::Completed);
        assert!(JobStatus::Completed < JobStatus::Failed);
    }

    #[test]
    fn classification() {
        let active = [
            JobStatus::Uploading,
            JobStatus::Transcribing,
            JobStatus::GeneratingVoice,
            JobStatus::Merging,
        ];
        let idle = [
            JobStatus::Pending,
            JobStatus::Transcribed,
            JobStatus::VoiceGenerated,
        ];
        for s in active {
            assert_eq!(s.class(), StatusClass::Active, "{s}");
        }
        for s in idle {
            assert_eq!(s.class(), StatusClass::Idle, "{s}");
        }
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn transitions_are_monotonic_except_failed() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Transcribing));
        assert!(JobStatus::Transcribed.can_transition_to(JobStatus::GeneratingVoice));
        assert!(!JobStatus::Merging.can_transition_to(JobStatus::Transcribed));
        assert!(!JobStatus::Transcribing.can_transition_to(JobStatus::Transcribing));
        assert!(JobStatus::Transcribing.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn action_preconditions() {
        assert!(Action::Transcribe.allowed_from(JobStatus::Pending));
        assert!(Action::Transcribe.allowed_from(JobStatus::Transcribed));
        assert!(!Action::Transcribe.allowed_from(JobStatus::Transcribing));

        assert!(Action::GenerateVoice.allowed_from(JobStatus::Transcribed));
        assert!(Action::GenerateVoice.allowed_from(JobStatus::VoiceGenerated));
        assert!(!Action::GenerateVoice.allowed_from(JobStatus::Pending));

        assert!(Action::Merge.allowed_from(JobStatus::VoiceGenerated));
        assert!(!Action::Merge.allowed_from(JobStatus::Merging));
        assert!(!Action::Merge.allowed_from(JobStatus::Completed));
    }
}
