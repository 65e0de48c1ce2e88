//! Pure helpers: input validation, time grids and slugs.

pub mod slug;
pub mod time_slots;
pub mod validation;

pub use time_slots::{
    format_selected_date_header, generate_time_slots, get_visible_time_slots,
    is_granularity_compatible, toggle_time_slot_for_date, DateHeader, GridSlot,
};
pub use validation::{
    is_future_date, is_future_date_from, is_valid_date, validate_email, validate_poll_title,
    validate_time_range, validate_time_slot,
};
