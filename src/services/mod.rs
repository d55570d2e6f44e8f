pub mod gadget_service;
