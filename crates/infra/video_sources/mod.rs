pub mod yt_dlp;
