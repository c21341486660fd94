pub mod generation_dto;
pub mod session_dto;
