//! Render a synthetic image set, calibrate it and print the report summary.

use chesscal::core::synthetic::{
    board_to_image_homography, orbit_poses, render_chessboard, PinholeIntrinsics,
};
use chesscal::{CalibrationConfig, Calibrator};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    chesscal::core::init_with_level(log::LevelFilter::Info)?;

    let config = CalibrationConfig {
        distortion_order: 8,
        ..Default::default()
    };
    let board = chesscal::Board::new(config.board_spec())?;
    let k = PinholeIntrinsics {
        fx: 820.0,
        fy: 815.0,
        cx: 318.0,
        cy: 243.0,
    };

    let dir = std::env::temp_dir().join("chesscal-synthetic");
    std::fs::create_dir_all(&dir)?;
    for (idx, pose) in orbit_poses(&board, 12, 650.0).iter().enumerate() {
        let h = board_to_image_homography(&k, pose);
        let Some(rendered) = render_chessboard(&board, &h, 640, 480, 8) else {
            continue;
        };
        let img = image::GrayImage::from_raw(640, 480, rendered.data)
            .ok_or("rendered buffer has the wrong size")?;
        img.save(dir.join(format!("view_{idx:02}.png")))?;
    }

    let outcome = Calibrator::from_config(&config)?.run_directory(&dir)?;
    println!("{}", outcome.report.summary());
    println!("true fx={} fy={} cx={} cy={}", k.fx, k.fy, k.cx, k.cy);
    Ok(())
}
