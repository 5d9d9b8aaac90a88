//! Workshop registration core: form schemas, submission validation, and the admission engine.

pub mod admission;
pub mod clock;
pub mod registration;
pub mod schema;
pub mod sync;
pub mod types;
pub mod validation;
pub mod workshop;

pub use admission::{
    admit, promote, release, within_capacity, Admission, AdmissionPolicy, AdmissionState,
    ClosePolicy, CounterDelta, Counters, Outcome, Promotion, RejectReason,
};
pub use clock::{ClockSource, SystemClock};
pub use registration::{respondent_email, Registration, RegistrationStatus, WaitlistEntry};
pub use schema::{
    FieldDefinition, FieldDraft, FieldOption, FieldPatch, FieldType, RegistrationFormConfig,
    SchemaError,
};
pub use sync::{reconcile, Reconciled, Versioned};
pub use types::{FormData, Value};
pub use validation::{derive_validator, FieldFailure, SubmissionValidator, ValidationResult};
pub use workshop::{NewWorkshop, Workshop, WorkshopStatus};
