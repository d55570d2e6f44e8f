pub mod gadget_routes;
pub mod system_routes;
