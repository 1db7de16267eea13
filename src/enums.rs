pub mod location_enum_type;
pub mod measurand_enum_type;
pub mod phase_enum_type;
pub mod reading_context_enum_type;
pub mod registration_status_enum_type;
