pub mod affiliate;
pub mod commission;
pub mod withdraw;
