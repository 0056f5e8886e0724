use chesscal::chessboard::{ChessboardDetector, ChessboardParams};
use chesscal::{gray_view, Board, BoardSpec};
use image::ImageReader;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing")]
    chesscal::core::init_tracing(false, "info");
    #[cfg(not(feature = "tracing"))]
    chesscal::core::init_with_level(log::LevelFilter::Info)?;

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("Usage: detect_chessboard <image_path> [cols] [rows]");
        return Ok(());
    };
    let cols = args.next().map(|s| s.parse::<u32>()).transpose()?.unwrap_or(9);
    let rows = args.next().map(|s| s.parse::<u32>()).transpose()?.unwrap_or(6);

    let board = Board::new(BoardSpec {
        cols,
        rows,
        square_size_mm: 25.0,
    })?;
    let img = ImageReader::open(path)?.decode()?.to_luma8();
    let detector = ChessboardDetector::new(board, ChessboardParams::default());

    match detector.detect(&gray_view(&img)) {
        Ok(found) => {
            println!(
                "detected {} corners (refine window {})",
                found.corners.len(),
                2 * found.refine_half_window + 1
            );
            for (idx, p) in found.corners.iter().enumerate() {
                println!("{idx:4} {:9.3} {:9.3}", p.x, p.y);
            }
        }
        Err(e) => println!("no board detected: {e}"),
    }

    Ok(())
}
