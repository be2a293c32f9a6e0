pub mod active_list;
pub mod checkpoint;
pub mod free_list;
pub mod map_table;
pub mod physical_register;
pub mod renamer;
