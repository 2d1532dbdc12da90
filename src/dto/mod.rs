pub mod scheduling_dto;
