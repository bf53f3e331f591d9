pub mod json_gallery_store;
