pub mod li_list;
