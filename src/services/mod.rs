pub mod assignment_service;
pub mod generation_service;
pub mod grading_service;
pub mod notification_service;
pub mod pool_selector;
pub mod score_allocator;
pub mod session_service;
