pub mod foreign_toplevel;
pub mod output_management;
