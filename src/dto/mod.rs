pub mod api_response;
pub mod bus_dto;
pub mod driver_dto;
pub mod route_dto;
pub mod student_dto;

pub use api_response::ApiResponse;
