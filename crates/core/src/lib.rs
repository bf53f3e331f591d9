pub mod shared {
    pub mod constants;
    pub mod encoding;
    pub mod image_files;
    pub mod model_resolver;
}

pub mod recognition {
    pub mod domain {
        pub mod face_recognizer;
    }
    pub mod infrastructure;
}

pub mod gallery {
    pub mod domain {
        pub mod gallery;
        pub mod gallery_store;
        pub mod identity;
        pub mod identity_name;
    }
    pub mod infrastructure;
}

pub mod matching {
    pub mod batch_context;
    pub mod batch_console;
    pub mod batch_logger;
    pub mod claim;
    pub mod conflict_resolver;
    pub mod encoding_cache;
    pub mod match_batch_use_case;
    pub mod match_image_use_case;
    pub mod infrastructure;
}

pub mod training {
    pub mod train_gallery_use_case;
}

#[cfg(test)]
pub(crate) mod test_support;
