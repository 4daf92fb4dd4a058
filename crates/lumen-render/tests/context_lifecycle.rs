mod common;

use common::{MAIN, SIDE, presented, setup};
use lumen_render::coords::{Vec2, Viewport};
use lumen_render::{
    BackendError, BlendMode, Color, Phase, RenderError, RenderState, Renderer, ResourceKey, Shape,
};

fn square(side: f32, color: Color) -> RenderState<'static> {
    RenderState::shape(Shape::Rect { size: Vec2::new(side, side) }, color)
}

#[test]
fn double_initialize_is_rejected_until_destroyed() {
    let (_backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    assert!(matches!(
        m.initialize_context(MAIN),
        Err(RenderError::AlreadyInitialized(w)) if w == MAIN
    ));

    m.destroy_context(MAIN).unwrap();
    assert!(m.initialize_context(MAIN).is_ok());
}

#[test]
fn renderer_ids_are_not_reused_while_a_handle_is_alive() {
    let (_backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();

    let (id, handle) = m.create_renderer().unwrap();
    assert_eq!(id.0, 0);
    m.free_renderer(id).unwrap();
    assert!(matches!(
        m.get_renderer(id),
        Err(RenderError::NotFound(ResourceKey::Renderer(r))) if r == id
    ));

    let (second, _keep) = m.create_renderer().unwrap();
    assert_ne!(second, id);

    drop(handle);
    let (third, _) = m.create_renderer().unwrap();
    assert_eq!(third, id);
}

#[test]
fn non_commutative_draws_follow_submission_order() {
    let (backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    let (_, renderer) = m.create_renderer().unwrap();
    let mut r = renderer.borrow_mut();

    r.draw(square(4.0, Color::from_rgba8(255, 0, 0, 255)));
    r.draw(square(4.0, Color::from_straight(0.0, 0.0, 1.0, 0.5)).with_blend_mode(BlendMode::Alpha));
    r.render().unwrap();
    assert_eq!(presented(&backend, MAIN, 2, 2), [128, 0, 128, 255]);

    r.draw(square(4.0, Color::from_straight(0.0, 0.0, 1.0, 0.5)).with_blend_mode(BlendMode::Alpha));
    r.draw(square(4.0, Color::from_rgba8(255, 0, 0, 255)));
    r.render().unwrap();
    assert_eq!(presented(&backend, MAIN, 2, 2), [255, 0, 0, 255]);
}

#[test]
fn clear_then_render_shows_only_the_clear_color() {
    let (backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    let (_, renderer) = m.create_renderer().unwrap();
    let mut r = renderer.borrow_mut();
    r.set_clear_color(Color::from_rgba8(10, 20, 30, 255));

    r.draw(square(4.0, Color::WHITE));
    r.render().unwrap();
    r.draw(square(2.0, Color::WHITE));
    r.clear();
    r.render().unwrap();

    for y in 0..4 {
        for x in 0..4 {
            assert_eq!(presented(&backend, MAIN, x, y), [10, 20, 30, 255]);
        }
    }
}

#[test]
fn viewport_clips_draws_until_reset() {
    let (backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    let (_, renderer) = m.create_renderer().unwrap();
    let mut r = renderer.borrow_mut();

    r.set_viewport(Viewport::new(2, 2, 2, 2));
    r.draw(square(4.0, Color::WHITE));
    r.render().unwrap();
    assert_eq!(presented(&backend, MAIN, 3, 3), [255, 255, 255, 255]);
    assert_eq!(presented(&backend, MAIN, 1, 1), [0, 0, 0, 0]);

    r.reset_viewport();
    r.draw(square(4.0, Color::WHITE));
    r.render().unwrap();
    assert_eq!(presented(&backend, MAIN, 1, 1), [255, 255, 255, 255]);
}

#[test]
fn destroying_a_context_invalidates_its_renderers() {
    let (backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    m.initialize_context(SIDE).unwrap();
    let (main_id, main_r) = m.create_renderer_for(MAIN).unwrap();
    let (_, side_r) = m.create_renderer_for(SIDE).unwrap();

    m.destroy_context(MAIN).unwrap();
    main_r.borrow_mut().draw(square(1.0, Color::WHITE));
    assert!(matches!(
        main_r.borrow_mut().render(),
        Err(RenderError::Backend(BackendError::ContextLost(w))) if w == MAIN
    ));
    assert_eq!(main_r.borrow().phase(), Phase::Invalidated);

    side_r.borrow_mut().draw(square(1.0, Color::WHITE));
    side_r.borrow_mut().render().unwrap();
    assert_eq!(presented(&backend, SIDE, 0, 0), [255, 255, 255, 255]);

    // Invalidated, not destroyed: the id resolves until freed.
    assert!(m.get_renderer(main_id).is_ok());
    m.free_renderer(main_id).unwrap();
    assert_eq!(m.renderer_count(), 1);
}

#[test]
fn transient_backend_error_leaves_the_renderer_usable() {
    let (backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    let (_, renderer) = m.create_renderer().unwrap();
    let mut r = renderer.borrow_mut();

    r.draw(square(4.0, Color::WHITE));
    backend.fail_next_present(MAIN);
    assert!(matches!(
        r.render(),
        Err(RenderError::Backend(BackendError::Surface(_)))
    ));

    r.render().unwrap();
    assert_eq!(presented(&backend, MAIN, 0, 0), [255, 255, 255, 255]);
}

#[test]
fn lost_context_recovers_through_destroy_and_initialize() {
    let (backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    let (id, renderer) = m.create_renderer().unwrap();

    backend.lose_context(MAIN);
    renderer.borrow_mut().draw(square(1.0, Color::WHITE));
    assert!(renderer.borrow_mut().render().is_err());
    assert!(renderer.borrow_mut().render().is_err());

    m.destroy_context(MAIN).unwrap();
    m.initialize_context(MAIN).unwrap();
    m.rebind_renderer(id, MAIN).unwrap();

    let mut r = renderer.borrow_mut();
    r.draw(square(1.0, Color::WHITE));
    r.render().unwrap();
    assert_eq!(presented(&backend, MAIN, 0, 0), [255, 255, 255, 255]);
}

#[test]
fn manager_teardown_destroys_remaining_contexts() {
    let (backend, mut m) = setup();
    m.initialize_context(MAIN).unwrap();
    m.initialize_context(SIDE).unwrap();
    m.create_texture(3, 3, lumen_render::BitDepth::Sixteen).unwrap();

    drop(m);
    let stats = backend.stats();
    assert_eq!(stats.surfaces_created, stats.surfaces_destroyed);
    assert_eq!(stats.live_textures, 0);
}
