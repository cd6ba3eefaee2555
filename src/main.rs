use tracing_subscriber::EnvFilter;

use vapor::{
    AppConfig, DirectionalLight, Material, Mesh, Quat, Scene, Texture, Transform, Vec3,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vapor=info")),
        )
        .init();

    let config = AppConfig::new()
        .title("Vapor")
        .size(800, 600)
        .settings_path("vapor-settings.json");

    if let Err(err) = vapor::run(config, build_scene) {
        tracing::error!(error = %err, "vapor exited with an error");
        std::process::exit(1);
    }
}

/// Floor, an alpha-mapped glass cube inside the fog sphere, a ring of glowing particles
/// and one shadow-casting light.
fn build_scene(gpu: &vapor::GpuContext) -> Scene {
    let mut scene = Scene::new();

    let plane = scene.add_mesh(Mesh::plane(gpu, 16.0));
    let cube = scene.add_mesh(Mesh::cube(gpu));
    let particle = scene.add_mesh(Mesh::sphere(gpu, 8, 6));
    let checker = scene.add_texture(Texture::alpha_checker(gpu, 64, 8, 0.2));

    let floor = scene.add_material(Material::opaque(Vec3::new(0.35, 0.33, 0.3)));
    scene.spawn(Transform::new(), plane, floor);

    let stone = scene.add_material(Material::opaque(Vec3::new(0.6, 0.55, 0.5)));
    scene.spawn(
        Transform::from_position(Vec3::new(-2.5, 0.5, -1.5)),
        cube,
        stone,
    );

    let glass = scene.add_material(Material::Transparent {
        color: Vec3::new(0.5, 0.8, 1.0),
        opacity: 0.6,
        alpha_map: Some(checker),
    });
    scene.spawn_transparent(
        Transform::from_position(Vec3::new(0.0, 1.0, 0.0))
            .rotation(Quat::from_rotation_y(0.6))
            .uniform_scale(1.5),
        cube,
        glass,
    );

    let glow = scene.add_material(Material::emissive(Vec3::new(1.0, 0.6, 0.25)));
    let count = 12;
    for i in 0..count {
        let angle = i as f32 / count as f32 * std::f32::consts::TAU;
        let position = Vec3::new(
            angle.cos() * 2.8,
            1.2 + 0.4 * (angle * 3.0).sin(),
            angle.sin() * 2.8,
        );
        scene.spawn(
            Transform::from_position(position).uniform_scale(0.08),
            particle,
            glow,
        );
    }

    scene.set_light(Some(DirectionalLight {
        position: Vec3::new(4.0, 8.0, 3.0),
        target: Vec3::ZERO,
        color: Vec3::new(1.0, 0.95, 0.85),
        intensity: 2.0,
        casts_shadow: true,
        shadow_extent: 8.0,
    }));

    scene
}
