pub mod video_analysis;
