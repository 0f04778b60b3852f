//! Example: Decompose a transform matrix.
//!
//! Run with: cargo run --example factor -- "( (2, 0, 0, 0), (0, 3, 0, 0), (0, 0, 4, 0), (1, 2, 3, 1) )"

use std::env;

use opal_math::Matrix4d;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: factor <matrix>");
        println!("\nThe matrix is four parenthesized rows, for example:");
        println!("  cargo run --example factor -- \\");
        println!("    \"( (2, 0, 0, 0), (0, 3, 0, 0), (0, 0, 4, 0), (1, 2, 3, 1) )\"");
        return;
    }

    let m: Matrix4d = match args[1].parse() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error parsing matrix: {}", e);
            return;
        }
    };

    println!("Matrix: {}", m);
    println!("Determinant: {}", m.determinant());
    println!("Handedness: {}", m.handedness());

    match m.try_inverse(0.0) {
        Ok(inv) => println!("Inverse: {}", inv),
        Err(e) => println!("Inverse: none ({})", e),
    }

    let f = m.factor();
    println!("\n--- Factorization ---");
    println!("  Singular: {}", f.is_singular);
    println!("  Rotation: {}", f.rotation);
    println!("  Scale: {}", f.scale);
    println!("  Shear: {}", f.shear);
    println!("  Translation: {}", f.translation);

    let rot = m.orthonormalized(true);
    println!("\nExtracted rotation: {}", rot.extract_rotation());
}
