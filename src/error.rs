use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::model::{
    common::{candidate::CandidateStatus, election::ElectionStatus, role::Role},
    mongodb::{is_transient_error, Id},
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Election {0} not found")]
    ElectionNotFound(Id),
    #[error("User {0} not found")]
    UserNotFound(Id),
    #[error("Candidate {0} not found")]
    CandidateNotFound(Id),
    #[error("Cannot move election from {from} to {to}")]
    InvalidStatusTransition {
        from: ElectionStatus,
        to: ElectionStatus,
    },
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("Election is {0} and can no longer be modified")]
    ElectionFinished(ElectionStatus),
    #[error("Election is not accepting recommendations")]
    NotInRecommendationPeriod,
    #[error("Election is not accepting candidacy changes")]
    NotInCandidatePeriod,
    #[error("Election is not open for voting")]
    NotInVotingPeriod,
    #[error("Members cannot recommend themselves")]
    SelfRecommendationNotAllowed,
    #[error("Already recommended someone for {0}")]
    DuplicateRecommendationForRole(Role),
    #[error("Recommendation limit of {0} reached")]
    RecommendationLimitExceeded(u32),
    #[error("Already voted for {0}")]
    DuplicateVoteForRole(Role),
    #[error("At least one role must be voted for")]
    NoCandidateSelected,
    #[error("Candidate {0} has not accepted their candidacy")]
    CandidateNotApproved(Id),
    #[error("Invalid candidate: {0}")]
    InvalidCandidate(String),
    #[error("Candidate is {actual}, expected {expected}")]
    InvalidCandidateStatus {
        expected: CandidateStatus,
        actual: CandidateStatus,
    },
    #[error("No recommendations for {0}")]
    NoRecommendations(Role),
    #[error("Results are only available once the election is closed")]
    ElectionNotClosed,
    #[error("User {0} is inactive")]
    UserInactive(Id),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Write conflict: {0}")]
    WriteConflict(String),
}

impl Error {
    /// A stable, machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ElectionNotFound(_) => "ELECTION_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::CandidateNotFound(_) => "CANDIDATE_NOT_FOUND",
            Self::InvalidStatusTransition { .. } => "ELECTION_INVALID_STATUS_TRANSITION",
            Self::InvalidDateRange(_) => "ELECTION_INVALID_DATE_RANGE",
            Self::ElectionFinished(_) => "ELECTION_FINISHED",
            Self::NotInRecommendationPeriod => "ELECTION_NOT_IN_RECOMMENDATION_PERIOD",
            Self::NotInCandidatePeriod => "ELECTION_NOT_IN_CANDIDATE_PERIOD",
            Self::NotInVotingPeriod => "ELECTION_NOT_IN_VOTING_PERIOD",
            Self::SelfRecommendationNotAllowed => "RECOMMEND_SELF_NOT_ALLOWED",
            Self::DuplicateRecommendationForRole(_) => "RECOMMEND_DUPLICATE_FOR_ROLE",
            Self::RecommendationLimitExceeded(_) => "RECOMMEND_LIMIT_EXCEEDED",
            Self::DuplicateVoteForRole(_) => "VOTE_DUPLICATE_FOR_ROLE",
            Self::NoCandidateSelected => "VOTE_NO_CANDIDATE_SELECTED",
            Self::CandidateNotApproved(_) => "CANDIDATE_NOT_APPROVED",
            Self::InvalidCandidate(_) => "VOTE_INVALID_CANDIDATE",
            Self::InvalidCandidateStatus { .. } => "CANDIDATE_INVALID_STATUS",
            Self::NoRecommendations(_) => "CANDIDATE_NO_RECOMMENDATIONS",
            Self::ElectionNotClosed => "ELECTION_NOT_CLOSED",
            Self::UserInactive(_) => "USER_INACTIVE",
            Self::Forbidden(_) => "AUTH_FORBIDDEN",
            Self::Unauthorized(_) => "AUTH_UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Db(_) | Self::WriteConflict(_) => "INTERNAL_ERROR",
            Self::Jwt(_) => "AUTH_INVALID_TOKEN",
        }
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::ElectionNotFound(_) | Self::UserNotFound(_) | Self::CandidateNotFound(_) => {
                Status::NotFound
            }
            Self::DuplicateRecommendationForRole(_) | Self::DuplicateVoteForRole(_) => {
                Status::Conflict
            }
            Self::Forbidden(_) => Status::Forbidden,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Db(_) | Self::WriteConflict(_) => Status::InternalServerError,
            _ => Status::BadRequest,
        }
    }

    /// Could re-running the whole unit of work succeed?
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Db(err) => is_transient_error(err),
            Self::WriteConflict(_) => true,
            _ => false,
        }
    }
}

/// The JSON body of an error response.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        // Never leak storage internals to the caller.
        let message = if err.status().code >= 500 {
            "Internal server error".to_string()
        } else {
            err.to_string()
        };
        Self {
            code: err.code().to_string(),
            message,
        }
    }
}

impl ErrorBody {
    /// A body for a bare status, when no richer error is known.
    pub fn for_status(status: Status) -> Self {
        let code = match status.code {
            400 => "BAD_REQUEST",
            401 => "AUTH_UNAUTHORIZED",
            403 => "AUTH_FORBIDDEN",
            404 => "NOT_FOUND",
            415 => "UNSUPPORTED_MEDIA_TYPE",
            422 => "UNPROCESSABLE_ENTITY",
            500..=599 => "INTERNAL_ERROR",
            _ => "REQUEST_FAILED",
        };
        Self {
            code: code.to_string(),
            message: status.reason().unwrap_or("Unknown error").to_string(),
        }
    }
}

/// The error behind a failed request guard, cached on the request for the
/// catchers to report.
#[derive(Debug, Clone, Default)]
pub struct AuthFailure(pub Option<ErrorBody>);

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        (status, Json(ErrorBody::from(&self))).respond_to(req)
    }
}
