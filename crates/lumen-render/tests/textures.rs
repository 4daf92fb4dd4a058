mod common;

use std::rc::Rc;

use common::{MAIN, setup};
use lumen_render::coords::Vec2;
use lumen_render::{BitDepth, Color, RenderError, RenderState, Renderer, ResourceKey, Shape};

#[test]
fn pixel_buffer_matches_dimensions_for_every_depth() {
    let (_backend, mut m) = setup();
    for depth in BitDepth::ALL {
        let (_, tex) = m.create_texture(3, 5, depth).unwrap();
        let len = tex.pixels().map(|p| p.len()).unwrap();
        assert_eq!(len, 3 * 5 * depth.bytes_per_pixel());
    }
}

#[test]
fn written_pixel_reads_back_and_edges_are_bounded() {
    let (_backend, mut m) = setup();
    let (_, tex) = m.create_texture(2, 2, BitDepth::ThirtyTwo).unwrap();

    tex.set_pixel(0, 0, 0x8040_20ff).unwrap();
    assert_eq!(tex.get_pixel(0, 0).unwrap(), 0x8040_20ff);
    assert!(matches!(
        tex.get_pixel(2, 0),
        Err(RenderError::OutOfBounds { x: 2, y: 0, width: 2, height: 2 })
    ));
}

#[test]
fn texture_id_round_trip_and_free() {
    let (backend, mut m) = setup();
    let (id, tex) = m.create_texture(1, 1, BitDepth::Eight).unwrap();
    assert!(Rc::ptr_eq(&m.get_texture(id).unwrap(), &tex));

    m.free_texture(id).unwrap();
    assert!(matches!(
        m.get_texture(id),
        Err(RenderError::NotFound(ResourceKey::Texture(t))) if t == id
    ));
    assert_eq!(backend.stats().live_textures, 1);

    drop(tex);
    assert_eq!(backend.stats().textures_released, 1);
}

#[test]
fn render_to_texture_syncs_the_backend_copy() {
    let (backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    let (_, target) = m.create_texture(2, 2, BitDepth::ThirtyTwo).unwrap();
    let (_, renderer) = m.create_renderer().unwrap();
    let mut r = renderer.borrow_mut();

    r.set_texture(Some(Rc::clone(&target)));
    r.draw(RenderState::shape(
        Shape::Rect { size: Vec2::new(1.0, 1.0) },
        Color::from_rgba8(0, 255, 0, 255),
    ));
    r.render().unwrap();

    assert_eq!(target.get_pixel(0, 0).unwrap(), 0xff00_ff00);
    let mirror = backend.texture_image(target.texture_id().unwrap()).unwrap();
    assert_eq!(mirror.pixel(0, 0).unwrap(), 0xff00_ff00);
    assert_eq!(backend.stats().presents, 0);
}

#[test]
fn clearing_a_texture_target_updates_the_backend_copy() {
    let (backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    let (_, target) = m.create_texture(2, 2, BitDepth::ThirtyTwo).unwrap();
    let (_, renderer) = m.create_renderer().unwrap();
    let mut r = renderer.borrow_mut();
    r.set_texture(Some(Rc::clone(&target)));

    r.draw(RenderState::shape(
        Shape::Rect { size: Vec2::new(2.0, 2.0) },
        Color::WHITE,
    ));
    r.render().unwrap();

    r.set_clear_color(Color::from_rgba8(0, 0, 255, 255));
    r.draw(RenderState::shape(
        Shape::Rect { size: Vec2::new(1.0, 1.0) },
        Color::WHITE,
    ));
    r.clear();
    r.render().unwrap();

    let mirror = backend.texture_image(target.texture_id().unwrap()).unwrap();
    for y in 0..2 {
        for x in 0..2 {
            assert_eq!(mirror.pixel(x, y).unwrap(), 0xffff_0000);
        }
    }
}

#[test]
fn failed_upload_is_caught_up_by_the_next_render() {
    let (backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    let (_, target) = m.create_texture(1, 1, BitDepth::ThirtyTwo).unwrap();
    let handle = target.texture_id().unwrap();
    let (_, renderer) = m.create_renderer().unwrap();
    let mut r = renderer.borrow_mut();
    r.set_texture(Some(Rc::clone(&target)));
    r.set_clear_color(Color::from_rgba8(255, 0, 0, 255));

    backend.fail_next_update(handle);
    r.clear();
    assert!(matches!(r.render(), Err(RenderError::Backend(_))));
    assert_eq!(backend.texture_image(handle).unwrap().pixel(0, 0).unwrap(), 0);

    r.render().unwrap();
    assert_eq!(
        backend.texture_image(handle).unwrap().pixel(0, 0).unwrap(),
        0xff00_00ff
    );
}

#[test]
fn sprite_is_sampled_with_wrap_or_clamp() {
    let (backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    let (_, sprite) = m.create_texture(2, 1, BitDepth::ThirtyTwo).unwrap();
    sprite.set_pixel(0, 0, 0xffff_ffff).unwrap();

    let (_, renderer) = m.create_renderer().unwrap();
    let mut r = renderer.borrow_mut();
    let strip = Shape::Rect { size: Vec2::new(4.0, 1.0) };

    r.set_wrapped(true);
    r.draw(RenderState::sprite(&sprite).with_shape(strip));
    r.render().unwrap();
    let frame = backend.presented_frame(MAIN).unwrap();
    assert_eq!(frame.pixel(2, 0).unwrap(), 0xffff_ffff);
    assert_eq!(frame.pixel(3, 0).unwrap(), 0);

    r.clear();
    r.set_wrapped(false);
    r.draw(RenderState::sprite(&sprite).with_shape(strip));
    r.render().unwrap();
    let frame = backend.presented_frame(MAIN).unwrap();
    assert_eq!(frame.pixel(2, 0).unwrap(), 0);
}

#[test]
fn decoded_file_becomes_a_texture() {
    let path = std::env::temp_dir().join(format!("lumen-decode-{}.png", std::process::id()));
    let mut png = image::RgbaImage::new(3, 2);
    png.put_pixel(2, 1, image::Rgba([1, 2, 3, 255]));
    png.save(&path).unwrap();

    let (_backend, mut m) = setup();
    let (_, tex) = m.create_texture_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!((tex.width(), tex.height()), (3, 2));
    assert_eq!(tex.bit_depth(), BitDepth::ThirtyTwo);
    assert_eq!(tex.get_pixel(2, 1).unwrap(), 0xff03_0201);
}

#[test]
fn missing_file_reports_a_decode_error() {
    let (_backend, mut m) = setup();
    let err = m.create_texture_from_file("/nonexistent/lumen.png").unwrap_err();
    assert!(matches!(err, RenderError::Decode { .. }));
    assert_eq!(m.texture_count(), 0);
}
