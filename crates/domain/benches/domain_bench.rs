use criterion::{Criterion, criterion_group, criterion_main};
use domain::{AggregateRoot, MediaKind, Rating, Video, VideoDetails};

fn details() -> VideoDetails {
    VideoDetails {
        title: "Benchmark Video".to_string(),
        description: "A video used for benchmarking".to_string(),
        year_launched: 2024,
        duration: 90,
        opened: false,
        published: true,
        rating: Rating::Age12,
    }
}

fn bench_create_video(c: &mut Criterion) {
    c.bench_function("domain/create_video", |b| {
        b.iter(|| Video::new(details()).unwrap());
    });
}

fn bench_attach_media(c: &mut Criterion) {
    c.bench_function("domain/attach_media", |b| {
        b.iter(|| {
            let mut video = Video::new(details()).unwrap();
            video.attach_media(MediaKind::Media, "raw/bench.mp4").unwrap();
            video.drain_events()
        });
    });
}

fn bench_encoding_lifecycle(c: &mut Criterion) {
    c.bench_function("domain/full_encoding_lifecycle", |b| {
        b.iter(|| {
            let mut video = Video::new(details()).unwrap();
            video.attach_media(MediaKind::Media, "raw/bench.mp4").unwrap();
            video.drain_events();
            video.mark_processing(MediaKind::Media).unwrap();
            video.mark_encoded(MediaKind::Media, "enc/bench.mp4").unwrap();
            video
        });
    });
}

fn bench_serialize_video(c: &mut Criterion) {
    let mut video = Video::new(details()).unwrap();
    video.attach_media(MediaKind::Media, "raw/bench.mp4").unwrap();
    video.attach_media(MediaKind::Trailer, "raw/trailer.mp4").unwrap();

    c.bench_function("domain/serialize_video", |b| {
        b.iter(|| serde_json::to_value(&video).unwrap());
    });
}

criterion_group!(
    benches,
    bench_create_video,
    bench_attach_media,
    bench_encoding_lifecycle,
    bench_serialize_video
);
criterion_main!(benches);
