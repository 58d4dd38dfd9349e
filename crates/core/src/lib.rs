//! Turns an ordered list of still images into a crossfading frame sequence
//! and hands it to a video encoder.
//!
//! The four pipeline steps are public functions so they can be called on
//! their own: [`normalize_colors`], [`fit_to_canvas`], [`blend_frames`] and
//! [`synthesize_sequence`]. [`CreateSlideshowUseCase`] wires them to the
//! file system and `ffmpeg`.

pub mod compositing {
    pub mod domain {
        pub mod canvas_fitter;
        pub mod color_normalizer;
        pub mod transition_blender;
    }
}

pub mod pipeline {
    pub mod blend_executor;
    pub mod create_slideshow_use_case;
    pub mod frame_timeline;
    pub mod pipeline_logger;
    pub mod sequence_synthesizer;

    pub mod infrastructure {
        pub mod threaded_blend_executor;
    }
}

pub mod shared {
    pub mod constants;
    pub mod error;
    pub mod frame;
    pub mod slideshow_config;
}

pub mod video {
    pub mod domain {
        pub mod frame_sink;
        pub mod image_reader;
        pub mod video_encoder;
    }

    pub mod infrastructure {
        pub mod directory_frame_sink;
        pub mod ffmpeg_encoder;
        pub mod image_directory_scanner;
        pub mod image_file_reader;
    }
}

pub use compositing::domain::canvas_fitter::fit_to_canvas;
pub use compositing::domain::color_normalizer::normalize_colors;
pub use compositing::domain::transition_blender::blend_frames;
pub use pipeline::create_slideshow_use_case::{CreateSlideshowUseCase, RunOutcome};
pub use pipeline::sequence_synthesizer::{synthesize_sequence, SynthesisOutcome, SynthesisReport};
pub use shared::error::SlideshowError;
pub use shared::frame::Frame;
pub use shared::slideshow_config::SlideshowConfig;
