pub mod meter_values;
pub mod start_transaction;
pub mod status_notification;
pub mod stop_transaction;
