//! Bevy replay of a finished run
//!
//! Takes the post-processed tracks as its only input and plays them back,
//! one grid sample per frame, with a trail behind each body. Nothing here
//! feeds back into the integration.

use bevy::math::primitives::Circle;
use bevy::prelude::*;
use bevy::sprite::{MaterialMesh2dBundle, Mesh2dHandle};

use crate::simulation::postprocess::PostProcessed;

#[derive(Component)]
struct BodyIndex(pub usize);

#[derive(Resource)]
struct Replay {
    output: PostProcessed,
    frame: usize,
    scale: f32,
}

const VIEW_HALF_WIDTH: f32 = 300.0; // pixels from the centre to the widest excursion
const BODY_RADIUS: f32 = 6.0;

pub fn run_replay(output: PostProcessed) {
    info!(bodies = output.tracks.len(), samples = output.times.len(), "starting replay viewer");

    let scale = VIEW_HALF_WIDTH / extent(&output).max(f32::EPSILON);

    App::new()
        .insert_resource(Replay { output, frame: 0, scale })
        .add_plugins(DefaultPlugins)
        .add_systems(Startup, setup_bodies_system)
        .add_systems(Update, (advance_frame_system, sync_transforms_system, draw_trails_system).chain())
        .run();
}

/// Largest absolute coordinate over every track
fn extent(output: &PostProcessed) -> f32 {
    output
        .tracks
        .iter()
        .flat_map(|t| t.x.iter().chain(t.y.iter()))
        .fold(0.0f64, |m, c| m.max(c.abs())) as f32
}

fn body_color(i: usize, n: usize) -> Color {
    Color::hsl(360.0 * i as f32 / n.max(1) as f32, 0.8, 0.6)
}

fn setup_bodies_system(mut commands: Commands, replay: Res<Replay>, mut meshes: ResMut<Assets<Mesh>>, mut materials: ResMut<Assets<ColorMaterial>>) {
    commands.spawn(Camera2dBundle::default());

    let n = replay.output.tracks.len();
    for (i, track) in replay.output.tracks.iter().enumerate() {
        let x = track.x[0] as f32 * replay.scale;
        let y = track.y[0] as f32 * replay.scale;

        commands.spawn((
            MaterialMesh2dBundle {
                mesh: Mesh2dHandle(meshes.add(Circle::new(BODY_RADIUS))),
                material: materials.add(ColorMaterial::from(body_color(i, n))),
                transform: Transform::from_xyz(x, y, 0.0),
                ..Default::default()
            },
            BodyIndex(i),
        ));
    }
}

fn advance_frame_system(mut replay: ResMut<Replay>) {
    let samples = replay.output.times.len();
    replay.frame = (replay.frame + 1) % samples.max(1);
}

fn sync_transforms_system(replay: Res<Replay>, mut query: Query<(&BodyIndex, &mut Transform)>) {
    for (BodyIndex(i), mut transform) in &mut query {
        if let Some(track) = replay.output.tracks.get(*i) {
            transform.translation.x = track.x[replay.frame] as f32 * replay.scale;
            transform.translation.y = track.y[replay.frame] as f32 * replay.scale;
        }
    }
}

fn draw_trails_system(replay: Res<Replay>, mut gizmos: Gizmos) {
    let n = replay.output.tracks.len();
    for (i, track) in replay.output.tracks.iter().enumerate() {
        let points = track.x[..=replay.frame]
            .iter()
            .zip(track.y[..=replay.frame].iter())
            .map(|(x, y)| Vec2::new(*x as f32, *y as f32) * replay.scale);
        gizmos.linestrip_2d(points, body_color(i, n));
    }
}
