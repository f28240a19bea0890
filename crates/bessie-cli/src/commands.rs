//! One-shot subcommands.

use std::sync::Arc;

use anyhow::{bail, Result};
use bessie_client::ClientConfig;
use bessie_core::{
    gallery, GalleryEvent, GallerySession, ImageRecord, ImageSource, Mode, SheetEvent,
};

pub async fn list<S: ImageSource>(
    source: Arc<S>,
    config: &ClientConfig,
    mode: Mode,
    page: usize,
    json: bool,
) -> Result<()> {
    let mut sheet = GallerySession::new(source, config.gallery_config(), config.grid_columns);
    sheet.start(mode);
    sheet.settle().await;
    check_loaded(&mut sheet)?;
    if page > 1 {
        if !sheet.jump_to_page(page) {
            bail!(
                "page {page} is out of range (1..={})",
                sheet.gallery().page_count()
            );
        }
        sheet.settle().await;
        check_loaded(&mut sheet)?;
    }

    let g = sheet.gallery();
    if json {
        let body = serde_json::json!({
            "mode": g.mode(),
            "page": g.current_page(),
            "pages": g.page_count(),
            "total": g.total(),
            "images": sheet.visible(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!(
            "{} order, page {}/{} ({} images)",
            g.mode(),
            g.current_page(),
            g.page_count(),
            g.total()
        );
        for (i, record) in sheet.visible().iter().enumerate() {
            println!("{:>4}  {}", g.offset() + i + 1, summary(record));
        }
    }
    sheet.dispose();
    Ok(())
}

fn check_loaded<S: ImageSource>(sheet: &mut GallerySession<S>) -> Result<()> {
    for event in sheet.take_events() {
        if let SheetEvent::Gallery(GalleryEvent::LoadFailed(err)) = event {
            sheet.dispose();
            return Err(err.into());
        }
    }
    Ok(())
}

pub async fn clusters<S: ImageSource>(source: &S, json: bool) -> Result<()> {
    let mut clusters = source.fetch_clusters().await?;
    clusters.sort_by(|a, b| b.images.len().cmp(&a.images.len()));

    if json {
        println!("{}", serde_json::to_string_pretty(&clusters)?);
        return Ok(());
    }
    if clusters.is_empty() {
        println!("No clusters");
        return Ok(());
    }
    for cluster in &clusters {
        let label = cluster
            .cluster_id
            .map_or_else(|| "unclustered".to_string(), |id| format!("cluster {id}"));
        println!("{label:<16} {:>5} images", cluster.images.len());
    }
    let flat = gallery::flatten_clusters(clusters);
    println!("{} images in cluster order", flat.len());
    Ok(())
}

pub async fn show<S: ImageSource>(source: &S, id: &str, json: bool) -> Result<()> {
    let record = source.fetch_image(id).await?;
    print_record(&record, json)
}

pub async fn gps<S: ImageSource>(source: &S, id: &str, lat: f64, lon: f64, json: bool) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        bail!("coordinates out of range: {lat}, {lon}");
    }
    let record = source.patch_gps(id, lat, lon).await?;
    if !json {
        println!("Location saved");
    }
    print_record(&record, json)
}

pub async fn status<S: ImageSource>(source: &S, config: &ClientConfig, fixture: bool) -> Result<()> {
    if fixture {
        println!("source:    fixture");
    } else {
        println!("source:    {}", config.api_url);
        println!(
            "auth:      {}",
            if config.token.is_some() { "bearer token" } else { "none" }
        );
    }
    println!(
        "viewer:    block {} / lookahead {}",
        config.block_size, config.lookahead
    );
    println!(
        "gallery:   page {} / {} columns",
        config.page_size, config.grid_columns
    );
    println!(
        "timing:    {}",
        if config.timing_enabled { "on" } else { "off" }
    );

    match source.fetch_images(0, 1).await {
        Ok(page) => match page.total {
            Some(total) => println!("backend:   reachable, {total} images"),
            None => println!("backend:   reachable, total unknown"),
        },
        Err(err) => println!("backend:   {err}"),
    }
    Ok(())
}

fn print_record(record: &ImageRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }
    println!("id:        {}", record.id);
    println!("name:      {}", record.original_name);
    println!("url:       {}", record.url);
    if let Some(thumb) = &record.thumbnail_url {
        println!("thumbnail: {thumb}");
    }
    match record.location() {
        Some((lat, lon)) => println!("location:  {lat:.6}, {lon:.6}"),
        None => println!("location:  none"),
    }
    if let Some(cluster) = record.cluster_id {
        println!("cluster:   {cluster}");
    }
    Ok(())
}

pub fn summary(record: &ImageRecord) -> String {
    match record.location() {
        Some((lat, lon)) => format!("{}  [{lat:.4}, {lon:.4}]", record.original_name),
        None => record.original_name.clone(),
    }
}
