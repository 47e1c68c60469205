use super::AppContext;
use crate::output::Output;
use crate::ui::Spinner;
use catalog_sync_core::{ListFlow, ListFlows};
use catalog_sync_models::CatalogId;
use catalog_sync_sources::factory;
use color_eyre::eyre::eyre;
use color_eyre::Result;

/// Run one list flow per catalog, in order. Returns whether every run succeeded.
pub async fn run_list_flow(ctx: &AppContext, catalogs: &[CatalogId], flow: ListFlow, output: &Output) -> Result<bool> {
    let flows = ListFlows::new(ctx.store(), &ctx.config.sync);
    let mut all_ok = true;

    for &catalog in catalogs {
        let mut adapter = factory::create_list_adapter(catalog, &ctx.config, &ctx.credentials, &ctx.paths)
            .map_err(|e| eyre!("Cannot {} {}: {}", flow.as_str(), catalog, e))?;

        let spinner = Spinner::start(output, format!("{} {} list", flow.as_str(), catalog));
        let report = flows.run(catalog, adapter.as_mut(), flow).await;
        spinner.finish();

        output.sync_report(&report);
        all_ok &= report.is_success();
    }

    Ok(all_ok)
}
