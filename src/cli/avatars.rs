// src/cli/avatars.rs — Avatar catalog browsing and selection

use crate::auth::LocalStore;
use crate::avatars::{fetch_catalog, AvatarCatalog, AvatarSummary};
use crate::infra::config::Config;

fn format_avatar(index: usize, avatar: &AvatarSummary) -> String {
    let name = if avatar.avatar_name.is_empty() {
        "(unnamed)"
    } else {
        avatar.avatar_name.as_str()
    };
    match avatar.gender.as_deref() {
        Some(g) => format!("{:>3}. {:<24} {} [{}]", index + 1, name, avatar.avatar_id, g),
        None => format!("{:>3}. {:<24} {}", index + 1, name, avatar.avatar_id),
    }
}

fn print_catalog(catalog: &AvatarCatalog, pages: usize) {
    let pages = pages.max(1);
    for (i, avatar) in catalog.revealed(pages).iter().enumerate() {
        println!("{}", format_avatar(i, avatar));
    }
    if catalog.has_more(pages) {
        eprintln!(
            "\n  page {}/{}; use --pages {} to see more",
            pages,
            catalog.page_count(),
            pages + 1
        );
    }
}

pub async fn run_avatars(config: &Config, pages: usize, select: Option<String>) -> anyhow::Result<()> {
    let catalog = fetch_catalog(&config.gateway.public_url).await?;

    if let Some(id) = select {
        let Some(avatar) = catalog.find(&id) else {
            anyhow::bail!("Avatar '{id}' is not in the catalog");
        };
        let store = LocalStore::open_default()?;
        store.select_avatar(&avatar.avatar_id)?;
        eprintln!("Selected {} for the next session.", avatar.avatar_name);
        return Ok(());
    }

    if catalog.is_empty() {
        eprintln!("No avatars available.");
        return Ok(());
    }
    print_catalog(&catalog, pages);
    Ok(())
}
