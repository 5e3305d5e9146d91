pub mod poll_routes;
