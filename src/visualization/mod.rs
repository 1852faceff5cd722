mod tables;

pub use tables::{
    format_hydraulics, print_hydraulics,
    format_profile_list, print_profile_list,
    format_profile_table, print_profile_table,
    format_texture, print_texture,
};
