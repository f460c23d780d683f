use warpcam_engine::mesh::{build_mesh, index_count, GridParams, MeshError};
use warpcam_engine::warp::{Barrel, Coefficients, Distortion};

#[test]
fn identity_4x4_grid_samples_grid_coordinates() {
    let mesh = build_mesh(GridParams::square(4), None).unwrap();

    assert_eq!(mesh.vertices().len(), 16);
    assert_eq!(mesh.indices().len() as u32, index_count(4, 4).unwrap());

    for row in 0..4 {
        for col in 0..4 {
            let v = mesh.vertex(col, row).unwrap();
            let expected = [col as f32 / 3.0, row as f32 / 3.0];
            assert_eq!(v.pos, expected);
            assert_eq!(v.tc, expected);
        }
    }
}

#[test]
fn unit_coefficients_match_identity_mesh() {
    let barrel = Barrel::new(Coefficients::new(0.0, 0.0, 0.0, 1.0), 1.0).unwrap();
    let warped = build_mesh(GridParams::square(4), Some(&barrel)).unwrap();
    let plain = build_mesh(GridParams::square(4), None).unwrap();

    assert_eq!(warped.indices(), plain.indices());
    for (w, p) in warped.vertices().iter().zip(plain.vertices()) {
        assert_eq!(w.pos, p.pos);
        assert!((w.tc[0] - p.tc[0]).abs() < 1e-6, "{:?} vs {:?}", w.tc, p.tc);
        assert!((w.tc[1] - p.tc[1]).abs() < 1e-6, "{:?} vs {:?}", w.tc, p.tc);
    }
}

#[test]
fn camera_aspect_barrel_mesh_is_finite() {
    let barrel = Barrel::for_resolution(Coefficients::new(0.1, -0.3, 0.25, 1.0), 640, 480).unwrap();
    let mesh = build_mesh(GridParams::default(), Some(&barrel)).unwrap();

    assert_eq!(mesh.vertices().len(), 32 * 32);
    assert_eq!(mesh.indices().len() as u32, index_count(32, 32).unwrap());
    assert!(mesh
        .vertices()
        .iter()
        .all(|v| v.tc.iter().all(|c| c.is_finite())));
}

#[test]
fn closure_distortion_drives_texcoords() {
    let mirror = |[x, y]: [f32; 2]| [1.0 - x, y];
    let mesh = build_mesh(GridParams::new(3, 2), Some(&mirror as &dyn Distortion)).unwrap();
    assert_eq!(mesh.vertex(0, 0).unwrap().tc, [1.0, 0.0]);
    assert_eq!(mesh.vertex(2, 1).unwrap().tc, [0.0, 1.0]);
}

#[test]
fn degenerate_grids_are_rejected_before_allocation() {
    for (w, h) in [(1, 4), (4, 1), (0, 0), (u32::MAX, 2)] {
        let err = build_mesh(GridParams::new(w, h), None).unwrap_err();
        assert_eq!(err, MeshError::InvalidGridDimensions { width: w, height: h });
    }
}
