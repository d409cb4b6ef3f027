pub mod turnips;
